//! Visit Pipeline
//!
//! The per-URL sequence:
//! 1. Navigate, then wait a jittered settle time (plus hydration on SPA sources)
//! 2. Capture and persist the raw rendered content
//! 3. Clean it and persist the cleaned version
//! 4. Extract postings, with raw-content and prior-capture fallbacks
//! 5. Classify the page and persist type and job count on the capture
//! 6. Normalize and upsert postings into the job cache
//! 7. Discover, filter, and enqueue outbound links
//! 8. Seed pagination URLs for listing pages
//!
//! Steps 2 to 8 are shared with the human-in-the-loop handlers through
//! `capture_and_process`. `visit` never returns an error: any failure becomes
//! an error `VisitResult`.

mod extract;
mod waits;

pub use extract::{extract_with_fallbacks, PageContent};
pub use waits::{settle_jitter, sleep_or_stop, until_stopped};

use crate::capabilities::BrowserSession;
use crate::events::{ActivityLog, Component};
use crate::frontier::{filter_links, CrawlState, FilterContext};
use crate::jobs::normalize_listing;
use crate::model::{PageType, VisitResult};
use crate::orchestrator::CrawlContext;
use crate::storage::{CaptureMeta, VisitStatus};
use crate::url::domain_matches;
use crate::Result;
use std::time::Duration;

/// Visits one URL; failures come back as an error `VisitResult`
pub async fn visit(
    ctx: &CrawlContext,
    log: &ActivityLog,
    state: &mut CrawlState,
    session: &mut dyn BrowserSession,
    url: &str,
    depth: u32,
) -> VisitResult {
    match visit_inner(ctx, log, state, session, url, depth).await {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => {
            log.info(Component::Pipeline, format!("Visit of {} interrupted by stop", url));
            VisitResult::failed(url, depth, e.to_string())
        }
        Err(e) => {
            log.error(Component::Pipeline, format!("Visit of {} failed: {}", url, e));
            VisitResult::failed(url, depth, e.to_string())
        }
    }
}

async fn visit_inner(
    ctx: &CrawlContext,
    log: &ActivityLog,
    state: &mut CrawlState,
    session: &mut dyn BrowserSession,
    url: &str,
    depth: u32,
) -> Result<VisitResult> {
    let stop = state.stop_token().clone();
    let crawler = &ctx.crawler;

    log.info(
        Component::Pipeline,
        format!("Navigating to {} (depth {})", url, depth),
    );
    let nav_timeout = Duration::from_millis(crawler.navigation_timeout_ms);
    until_stopped(&stop, session.navigate(url, nav_timeout)).await??;

    let settle = settle_jitter(crawler.settle_min_ms, crawler.settle_max_ms);
    log.debug(
        Component::Pipeline,
        format!("Settling for {}ms", settle.as_millis()),
    );
    sleep_or_stop(&stop, settle).await?;

    if is_spa(&crawler.spa_domains, url) {
        let hydration = Duration::from_millis(crawler.hydration_ms);
        let hydrated = until_stopped(
            &stop,
            session.wait_for_selector(&crawler.hydration_selector, hydration),
        )
        .await??;
        if !hydrated {
            log.warn(
                Component::Pipeline,
                format!(
                    "'{}' did not appear within {}ms",
                    crawler.hydration_selector, crawler.hydration_ms
                ),
            );
        }
    }

    capture_and_process(ctx, log, state, session, url, depth).await
}

fn is_spa(spa_domains: &[String], url: &str) -> bool {
    let Some(host) = ::url::Url::parse(url)
        .ok()
        .and_then(|u| crate::url::extract_domain(&u))
    else {
        return false;
    };
    spa_domains
        .iter()
        .any(|pattern| domain_matches(pattern, &host))
}

/// Runs steps 2 to 8 on whatever the session currently shows
pub async fn capture_and_process(
    ctx: &CrawlContext,
    log: &ActivityLog,
    state: &mut CrawlState,
    session: &mut dyn BrowserSession,
    url: &str,
    depth: u32,
) -> Result<VisitResult> {
    let store = &ctx.caps.store;
    let stop = state.stop_token().clone();

    // 2. Raw capture
    let raw_html = until_stopped(&stop, session.read_rendered_content()).await??;
    let capture_id = store
        .save_raw_capture(state.source_id, url, &raw_html)
        .await?;

    // 3. Cleaning
    let cleaned = ctx.caps.cleaner.clean(&raw_html, url).await?;
    store
        .save_cleaned_capture(capture_id, &cleaned.cleaned_html)
        .await?;
    log.info(
        Component::Pipeline,
        format!(
            "Cleaned {} -> {} bytes ({} elements removed)",
            cleaned.original_size, cleaned.cleaned_size, cleaned.elements_removed
        ),
    );

    // 4. Extraction
    let page = PageContent {
        url,
        raw_html: &raw_html,
        cleaned_html: &cleaned.cleaned_html,
        capture_id: Some(capture_id),
    };
    let extraction = extract_with_fallbacks(ctx, log, state, &page).await?;

    // 5. Classification
    let page_type = match ctx.caps.classifier.classify(&cleaned.cleaned_html, url).await {
        Ok(classification) => {
            log.info(
                Component::Pipeline,
                format!(
                    "Classified as {} ({:.2} via {})",
                    classification.page_type, classification.confidence, classification.method
                ),
            );
            classification.page_type
        }
        Err(e) => {
            log.warn(
                Component::Pipeline,
                format!("Classification failed ({}), assuming job list", e),
            );
            PageType::JobList
        }
    };
    if page_type.is_blocking() {
        log.warn(
            Component::Pipeline,
            format!("{} is blocked ({})", url, page_type),
        );
    }

    // 6. Job cache
    let jobs: Vec<_> = extraction
        .listings
        .iter()
        .filter_map(|listing| normalize_listing(state.source_id, listing, url))
        .collect();
    for job in &jobs {
        store.upsert_job(job).await?;
    }

    let strategy = (!extraction.strategy.is_empty()).then(|| extraction.strategy.clone());
    store
        .update_capture_meta(
            capture_id,
            &CaptureMeta {
                page_type,
                jobs_count: jobs.len(),
                extraction_strategy: strategy.clone(),
            },
        )
        .await?;
    log.info(
        Component::Pipeline,
        format!(
            "Extracted {} jobs from {} via {}",
            jobs.len(),
            url,
            strategy.as_deref().unwrap_or("none")
        ),
    );

    // 7. Link discovery
    let candidates: Vec<String> = ctx
        .caps
        .links
        .extract_links(&cleaned.cleaned_html, url)
        .iter()
        .map(|link| ctx.caps.links.normalize(link))
        .collect();
    let survivors = filter_links(
        &candidates,
        &FilterContext {
            source_domain: &state.source_domain,
            url_seen: &state.url_seen,
            frontier: &state.frontier,
            current_depth: depth,
            max_depth: state.limits.max_depth,
        },
    );
    let links_discovered = survivors
        .iter()
        .filter(|link| state.push(link, depth + 1, ctx.crawler.link_priority))
        .count();

    // 8. Pagination seeds
    let mut seeded = 0;
    if page_type.is_listing() {
        for seed in ctx
            .caps
            .links
            .generate_pagination_seeds(url, ctx.crawler.pagination_seeds)
        {
            if state.push(&seed, depth + 1, ctx.crawler.pagination_priority) {
                seeded += 1;
            }
        }
    }
    log.info(
        Component::Frontier,
        format!(
            "Queued {} of {} links and {} pagination seeds; frontier size {}",
            links_discovered,
            candidates.len(),
            seeded,
            state.frontier.len()
        ),
    );

    store
        .mark_visited(state.source_id, url, VisitStatus::Visited)
        .await?;

    Ok(VisitResult {
        capture_id: Some(capture_id),
        page_type,
        jobs_count: jobs.len(),
        extraction_strategy: strategy,
        links_discovered: links_discovered + seeded,
        content_size: raw_html.len(),
        ..VisitResult::new(url, depth)
    })
}
