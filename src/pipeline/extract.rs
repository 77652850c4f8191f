//! Posting extraction with the raw-content and prior-capture fallbacks

use crate::capabilities::{ExtractHints, Extraction};
use crate::events::{ActivityLog, Component};
use crate::frontier::CrawlState;
use crate::orchestrator::CrawlContext;
use crate::Result;

/// Content a page offers to the extractor
pub struct PageContent<'a> {
    pub url: &'a str,
    pub raw_html: &'a str,
    pub cleaned_html: &'a str,
    /// Capture holding this content, excluded from prior-capture recovery
    pub capture_id: Option<i64>,
}

/// Extracts postings, falling back when a stage yields nothing
///
/// 1. Cleaned content
/// 2. Raw content (some extractors need the un-stripped embedded data)
/// 3. If the raw content is large, the best prior capture of the source
///
/// An extractor error counts as an empty stage.
pub async fn extract_with_fallbacks(
    ctx: &CrawlContext,
    log: &ActivityLog,
    state: &CrawlState,
    page: &PageContent<'_>,
) -> Result<Extraction> {
    let mut hints = ExtractHints {
        source_slug: state.source_slug.clone(),
        source_type: state.source_type.clone(),
        raw_content: false,
    };

    let cleaned = run_stage(ctx, log, page.cleaned_html, page.url, &hints, "cleaned").await;
    if !cleaned.listings.is_empty() {
        return Ok(cleaned);
    }

    hints.raw_content = true;
    let raw = run_stage(ctx, log, page.raw_html, page.url, &hints, "raw").await;
    if !raw.listings.is_empty() {
        return Ok(raw);
    }

    if page.raw_html.len() >= ctx.crawler.large_content_bytes {
        let prior = ctx.caps.store.best_capture(state.source_id).await?;
        match prior {
            Some(capture) if Some(capture.id) != page.capture_id => {
                log.info(
                    Component::Pipeline,
                    format!(
                        "Recovering from prior capture #{} ({} jobs at {})",
                        capture.id, capture.jobs_count, capture.url
                    ),
                );
                let recovered = run_stage(
                    ctx,
                    log,
                    capture.best_html(),
                    &capture.url,
                    &hints,
                    "prior capture",
                )
                .await;
                if !recovered.listings.is_empty() {
                    return Ok(Extraction {
                        strategy: format!("{}+prior-capture", recovered.strategy),
                        ..recovered
                    });
                }
            }
            _ => log.debug(Component::Pipeline, "No prior capture to recover from"),
        }
    }

    Ok(cleaned)
}

async fn run_stage(
    ctx: &CrawlContext,
    log: &ActivityLog,
    html: &str,
    url: &str,
    hints: &ExtractHints,
    stage: &str,
) -> Extraction {
    match ctx.caps.extractor.extract(html, url, hints).await {
        Ok(extraction) => {
            log.debug(
                Component::Pipeline,
                format!(
                    "Extraction from {} content: {} listings via {}",
                    stage,
                    extraction.listings.len(),
                    extraction.strategy
                ),
            );
            extraction
        }
        Err(e) => {
            log.warn(
                Component::Pipeline,
                format!("Extraction from {} content failed: {}", stage, e),
            );
            Extraction::default()
        }
    }
}
