//! The per-source crawl loop
//!
//! Each turn asks the planner for exactly one action, executes it, lets the
//! advisory review the outcome, and stores the result for the next decision.
//! Actions of one source are strictly sequential.

use super::CrawlContext;
use crate::brain;
use crate::capabilities::BrowserSession;
use crate::correction::apply_correction;
use crate::events::{ActivityLog, Component};
use crate::frontier::{repopulate, CrawlState};
use crate::human::{handle_wall, Wall};
use crate::model::{Adaptation, Source, VisitResult};
use crate::pipeline::{sleep_or_stop, visit};
use crate::planner::{decide, Action, DoneReason};
use crate::storage::{ScrapeStatus, VisitStatus};
use crate::Result;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Number of unvisited URLs named when a crawl ends early
const LEFTOVER_PREVIEW: usize = 5;

/// Per-crawl options supplied by the scheduler
#[derive(Debug, Clone, Default)]
pub struct CrawlOptions {
    /// Cycle number, reported to the advisory
    pub cycle: u32,
    /// URL corrections already spent on this source in earlier crawls
    pub url_correction_attempts: u32,
}

/// Outcome of one source's crawl
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub jobs_extracted: usize,
    pub pages_visited: usize,
    pub end: DoneReason,
    /// Running cross-crawl correction counter, to carry into the next crawl
    pub url_correction_attempts: u32,
    /// Inter-cycle delay suggested by the advisory (seconds)
    pub cycle_delay_hint: Option<u64>,
    /// Start URL at the end of the crawl, after any correction
    pub start_url: String,
}

/// Crawls one source until stop, job cap, or an empty frontier with no refills left
///
/// Visits and handlers never fail the crawl; only the store calls that open
/// and close it can.
pub async fn run_crawl(
    ctx: &CrawlContext,
    source: &Source,
    session: &mut dyn BrowserSession,
    stop: &CancellationToken,
    options: &CrawlOptions,
) -> Result<CrawlSummary> {
    run_crawl_tracked(ctx, source, session, stop, options).await.1
}

/// Runs a crawl and also reports the correction counter it ended with
///
/// The counter is returned even when the crawl fails, so corrections spent
/// before the failure still count against the source's budget.
pub(super) async fn run_crawl_tracked(
    ctx: &CrawlContext,
    source: &Source,
    session: &mut dyn BrowserSession,
    stop: &CancellationToken,
    options: &CrawlOptions,
) -> (u32, Result<CrawlSummary>) {
    let log = ActivityLog::new(ctx.caps.events.clone(), source.name.clone());
    let mut state = CrawlState::new(source, ctx.limits(), stop.clone());
    state.url_correction_attempts = options.url_correction_attempts;

    let result = crawl_with_state(ctx, &log, source, &mut state, session, options.cycle).await;
    (state.url_correction_attempts, result)
}

async fn crawl_with_state(
    ctx: &CrawlContext,
    log: &ActivityLog,
    source: &Source,
    state: &mut CrawlState,
    session: &mut dyn BrowserSession,
    cycle: u32,
) -> Result<CrawlSummary> {
    let store = &ctx.caps.store;

    let blocked = store
        .list_visited(source.id, Some(VisitStatus::Blocked))
        .await?;
    for url in &blocked {
        state.mark_seen(url);
    }

    store
        .set_scrape_status(source.id, ScrapeStatus::Running, None)
        .await?;
    log.info(
        Component::Orchestrator,
        format!(
            "Crawl of {} started at {} (cycle {}, {} blocked URLs skipped)",
            source.name,
            source.url,
            cycle,
            blocked.len()
        ),
    );

    let (end, pages_visited) = drive(ctx, log, state, session, cycle).await;
    log_leftovers(log, state);

    let (status, message) = match end {
        DoneReason::StopRequested => (ScrapeStatus::Stopped, end.to_string()),
        DoneReason::CapReached | DoneReason::FrontierEmpty => (
            ScrapeStatus::Success,
            format!("{}: {} jobs extracted", end, state.jobs_extracted),
        ),
    };
    store
        .set_scrape_status(source.id, status, Some(&message))
        .await?;
    log.info(
        Component::Orchestrator,
        format!(
            "Crawl of {} finished ({}): {} pages, {} jobs",
            source.name, end, pages_visited, state.jobs_extracted
        ),
    );

    Ok(CrawlSummary {
        jobs_extracted: state.jobs_extracted,
        pages_visited,
        end,
        url_correction_attempts: state.url_correction_attempts,
        cycle_delay_hint: state.cycle_delay_hint,
        start_url: state.start_url.clone(),
    })
}

/// Logs a sample of whatever is still queued when the crawl ends
fn log_leftovers(log: &ActivityLog, state: &CrawlState) {
    let pending = state.frontier.len();
    if pending == 0 {
        return;
    }
    let sample: Vec<&str> = state
        .frontier
        .iter()
        .take(LEFTOVER_PREVIEW)
        .map(|entry| entry.url.as_str())
        .collect();
    let more = pending.saturating_sub(sample.len());
    let suffix = if more > 0 {
        format!(" (+{} more)", more)
    } else {
        String::new()
    };
    log.debug(
        Component::Frontier,
        format!("{} URLs left unvisited: {}{}", pending, sample.join(", "), suffix),
    );
}

/// Executes planner actions until a terminal one, returning it with the visit count
async fn drive(
    ctx: &CrawlContext,
    log: &ActivityLog,
    state: &mut CrawlState,
    session: &mut dyn BrowserSession,
    cycle: u32,
) -> (DoneReason, usize) {
    let mut pages_visited = 0;

    loop {
        let action = decide(state);
        log.debug(Component::Planner, format!("Next action: {:?}", action));

        // The adaptation on the previous result is spent by this action
        let prior = state.last_result.take();

        let result = match action {
            Action::CycleDone(DoneReason::FrontierEmpty)
                if state.refills < state.limits.max_refills =>
            {
                log.info(Component::Planner, "Frontier empty, repopulating");
                repopulate(&ctx.caps, log, state, ctx.crawler.link_priority).await;
                continue;
            }
            Action::CycleDone(reason) => {
                log.info(Component::Planner, format!("Cycle done: {}", reason));
                return (reason, pages_visited);
            }
            Action::VisitUrl { url, depth } => {
                if prior.as_ref().and_then(|r| r.adaptation) == Some(Adaptation::RetryExtraction) {
                    state.retry_count += 1;
                    log.info(
                        Component::Planner,
                        format!(
                            "Retrying extraction of {} ({}/{})",
                            url, state.retry_count, state.limits.max_retries
                        ),
                    );
                }
                state.mark_seen(&url);
                pages_visited += 1;
                visit(ctx, log, state, session, &url, depth).await
            }
            Action::RetryWait {
                wait_ms,
                reason,
                retry_url,
                retry_depth,
            } => {
                state.retry_count += 1;
                log.info(
                    Component::Planner,
                    format!(
                        "Waiting {}s before retrying {} ({}); retry {}/{}",
                        wait_ms / 1000,
                        retry_url,
                        reason,
                        state.retry_count,
                        state.limits.max_retries
                    ),
                );
                // On stop the next decision ends the crawl
                if sleep_or_stop(state.stop_token(), Duration::from_millis(wait_ms))
                    .await
                    .is_ok()
                {
                    state.requeue_front(&retry_url, retry_depth);
                }
                continue;
            }
            Action::ApplyUrlCorrection { url, source_name } => {
                let suggested = prior.as_ref().and_then(|r| r.suggested_url.as_deref());
                apply_correction(ctx, log, state, &url, &source_name, suggested).await;
                continue;
            }
            Action::TriggerCaptcha { url } => {
                let depth = prior_depth(prior.as_ref());
                handle_wall(ctx, log, state, Wall::Captcha, &url, depth).await
            }
            Action::TriggerLoginWall { url } => {
                let depth = prior_depth(prior.as_ref());
                handle_wall(ctx, log, state, Wall::LoginWall, &url, depth).await
            }
        };

        state.jobs_extracted += result.jobs_count;
        let decision = brain::review(ctx, log, state, &result, cycle).await;
        state.last_result = Some(result);
        brain::apply_decision(state, decision, ctx.scheduler.retry_wait_default_ms);
    }
}

fn prior_depth(prior: Option<&VisitResult>) -> u32 {
    prior.map(|r| r.depth).unwrap_or(0)
}
