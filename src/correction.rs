//! URL self-correction
//!
//! On a `TRY_NEW_URL` adaptation the broken URL is handed to the resolution
//! capability together with the running cross-crawl attempt counter. A URL
//! suggested by the advisory is tried first, if it validates. A repaired URL
//! becomes the source's stored start URL and is visited next.

use crate::events::{ActivityLog, Component};
use crate::frontier::CrawlState;
use crate::orchestrator::CrawlContext;
use crate::pipeline::until_stopped;
use crate::url::extract_domain;
use crate::Result;

/// Handles an `APPLY_URL_CORRECTION` action, returning the corrected URL if any
///
/// Failures are logged and leave the crawl unchanged.
pub async fn apply_correction(
    ctx: &CrawlContext,
    log: &ActivityLog,
    state: &mut CrawlState,
    broken_url: &str,
    source_name: &str,
    suggested: Option<&str>,
) -> Option<String> {
    let attempts_so_far = state.url_correction_attempts;
    state.url_correction_attempts += 1;
    log.info(
        Component::Correction,
        format!(
            "Resolving replacement for {} (attempt {}/{})",
            broken_url, state.url_correction_attempts, state.limits.max_url_corrections
        ),
    );

    let found = find_replacement(
        ctx,
        log,
        state,
        broken_url,
        source_name,
        suggested,
        attempts_so_far,
    )
    .await;
    let corrected = match found {
        Ok(Some(url)) => url,
        Ok(None) => {
            log.warn(
                Component::Correction,
                format!("No working replacement found for {}", broken_url),
            );
            return None;
        }
        Err(e) => {
            log.warn(Component::Correction, format!("URL correction failed: {}", e));
            return None;
        }
    };

    if let Err(e) = ctx
        .caps
        .store
        .update_source_url(state.source_id, &corrected)
        .await
    {
        log.error(
            Component::Correction,
            format!("Could not persist corrected URL: {}", e),
        );
        return None;
    }

    if let Some(domain) = ::url::Url::parse(&corrected)
        .ok()
        .and_then(|u| extract_domain(&u))
    {
        state.source_domain = domain;
    }
    state.start_url = corrected.clone();
    state.requeue_front(&corrected, 0);

    log.info(
        Component::Correction,
        format!("Source URL corrected: {} -> {}", broken_url, corrected),
    );
    Some(corrected)
}

async fn find_replacement(
    ctx: &CrawlContext,
    log: &ActivityLog,
    state: &CrawlState,
    broken_url: &str,
    source_name: &str,
    suggested: Option<&str>,
    attempts_so_far: u32,
) -> Result<Option<String>> {
    let stop = state.stop_token();

    if let Some(candidate) = suggested.filter(|s| *s != broken_url) {
        let validation =
            until_stopped(stop, ctx.caps.validator.validate(state.source_id, candidate)).await??;
        if validation.is_valid {
            log.info(
                Component::Correction,
                format!("Advisory suggestion {} validates", candidate),
            );
            return Ok(Some(candidate.to_string()));
        }
        log.debug(
            Component::Correction,
            format!(
                "Advisory suggestion {} rejected ({})",
                candidate,
                validation
                    .error_message
                    .as_deref()
                    .unwrap_or("invalid")
            ),
        );
    }

    let resolution = until_stopped(
        stop,
        ctx.caps
            .resolver
            .resolve(broken_url, source_name, attempts_so_far),
    )
    .await??;

    log.debug(
        Component::Correction,
        format!(
            "Resolver tried {} candidates via {}",
            resolution.attempts_made, resolution.method
        ),
    );

    Ok(resolution
        .corrected_url
        .filter(|corrected| corrected != broken_url))
}
