//! Brain advisory
//!
//! After every visit the outcome is summarized into an `AdvisoryContext` and
//! handed to the advisor capability. The answer is bounded by a timeout and
//! by the stop signal; anything other than a timely, well-formed decision
//! becomes `CONTINUE` so the crawl never stalls on the advisory.

use crate::capabilities::Validation;
use crate::events::{ActivityLog, Component};
use crate::frontier::CrawlState;
use crate::model::{Adaptation, PageType, VisitResult};
use crate::orchestrator::CrawlContext;
use crate::pipeline::until_stopped;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Wait used for `RETRY_CYCLE_SOON` when the advisor names none
pub const DEFAULT_RETRY_WAIT_MS: u64 = 60_000;

/// The advisor's overall judgement of a visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    #[default]
    Ok,
    Degraded,
    Blocked,
    Broken,
}

/// An advisory decision; translated into `VisitResult::adaptation`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrainDecision {
    #[serde(default)]
    pub verdict: Verdict,
    pub next_action: Adaptation,
    #[serde(default)]
    pub suggested_url: Option<String>,
    #[serde(default)]
    pub wait_seconds: Option<u64>,
    #[serde(default)]
    pub cycle_delay_seconds: Option<u64>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

impl BrainDecision {
    /// The safe default: verdict ok, keep crawling
    pub fn proceed() -> Self {
        Self {
            verdict: Verdict::Ok,
            next_action: Adaptation::Continue,
            suggested_url: None,
            wait_seconds: None,
            cycle_delay_seconds: None,
            reasoning: None,
        }
    }

    pub fn adapt(verdict: Verdict, next_action: Adaptation) -> Self {
        Self {
            verdict,
            next_action,
            ..Self::proceed()
        }
    }
}

/// Summary of a source's stored captures
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CaptureHistory {
    pub total_captures: usize,
    pub captures_with_jobs: usize,
    pub best_jobs_count: usize,
    pub best_strategy: Option<String>,
}

/// Everything the advisor sees about one visit
#[derive(Debug, Clone, Serialize)]
pub struct AdvisoryContext {
    pub source_id: i64,
    pub source_name: String,
    pub url: String,
    pub depth: u32,
    pub page_type: PageType,
    pub jobs_count: usize,
    pub extraction_strategy: Option<String>,
    pub links_discovered: usize,
    pub content_size: usize,
    pub error: Option<String>,
    pub validation: Option<Validation>,
    pub recent_activity: String,
    pub cycle: u32,
    pub attempt: u32,
    pub capture_history: CaptureHistory,
    pub frontier_size: usize,
    pub url_correction_attempts: u32,
}

/// Builds the advisory context for a visit
///
/// The source URL is validated only when the visit failed, bounded by the
/// advisory timeout and by the stop signal. A validation that fails, times
/// out, or is stopped leaves `validation` empty. Store errors degrade to an
/// empty capture history.
pub async fn build_context(
    ctx: &CrawlContext,
    log: &ActivityLog,
    state: &CrawlState,
    result: &VisitResult,
    cycle: u32,
) -> AdvisoryContext {
    let validation = if result.is_error() && !state.stop_requested() {
        validate_bounded(ctx, log, state, &result.url).await
    } else {
        None
    };

    let capture_history = match ctx.caps.store.list_captures(state.source_id).await {
        Ok(captures) => {
            let best = captures.iter().max_by_key(|c| c.jobs_count);
            CaptureHistory {
                total_captures: captures.len(),
                captures_with_jobs: captures.iter().filter(|c| c.jobs_count > 0).count(),
                best_jobs_count: best.map(|c| c.jobs_count).unwrap_or(0),
                best_strategy: best.and_then(|c| c.extraction_strategy.clone()),
            }
        }
        Err(e) => {
            log.warn(Component::Brain, format!("Capture history unavailable: {}", e));
            CaptureHistory::default()
        }
    };

    AdvisoryContext {
        source_id: state.source_id,
        source_name: state.source_name.clone(),
        url: result.url.clone(),
        depth: result.depth,
        page_type: result.page_type,
        jobs_count: result.jobs_count,
        extraction_strategy: result.extraction_strategy.clone(),
        links_discovered: result.links_discovered,
        content_size: result.content_size,
        error: result.error.clone(),
        validation,
        recent_activity: log.snippet(),
        cycle,
        attempt: state.retry_count + 1,
        capture_history,
        frontier_size: state.frontier.len(),
        url_correction_attempts: state.url_correction_attempts,
    }
}

async fn validate_bounded(
    ctx: &CrawlContext,
    log: &ActivityLog,
    state: &CrawlState,
    url: &str,
) -> Option<Validation> {
    let timeout = Duration::from_millis(ctx.scheduler.advisory_timeout_ms);
    let check = tokio::time::timeout(timeout, ctx.caps.validator.validate(state.source_id, url));

    match until_stopped(state.stop_token(), check).await {
        Ok(Ok(Ok(validation))) => Some(validation),
        Ok(Ok(Err(e))) => {
            log.warn(Component::Brain, format!("Validation failed: {}", e));
            None
        }
        Ok(Err(_)) => {
            log.warn(
                Component::Brain,
                format!("Validation timed out after {}ms", timeout.as_millis()),
            );
            None
        }
        Err(_) => {
            log.debug(Component::Brain, "Stop requested during validation");
            None
        }
    }
}

/// Asks the advisor about a visit, defaulting to CONTINUE on failure, timeout, or stop
pub async fn review(
    ctx: &CrawlContext,
    log: &ActivityLog,
    state: &CrawlState,
    result: &VisitResult,
    cycle: u32,
) -> BrainDecision {
    if state.stop_requested() {
        log.debug(Component::Brain, "Stop requested, skipping advisory");
        return BrainDecision::proceed();
    }

    let context = build_context(ctx, log, state, result, cycle).await;
    let timeout = Duration::from_millis(ctx.scheduler.advisory_timeout_ms);

    let outcome = tokio::select! {
        _ = state.stop_token().cancelled() => {
            log.debug(Component::Brain, "Stop requested during advisory call");
            return BrainDecision::proceed();
        }
        outcome = tokio::time::timeout(timeout, ctx.caps.advisor.analyze(&context)) => outcome,
    };

    let decision = match outcome {
        Ok(Ok(decision)) => decision,
        Ok(Err(e)) => {
            log.warn(
                Component::Brain,
                format!("Advisory failed ({}), continuing", e),
            );
            BrainDecision::proceed()
        }
        Err(_) => {
            log.warn(
                Component::Brain,
                format!("Advisory timed out after {}ms, continuing", timeout.as_millis()),
            );
            BrainDecision::proceed()
        }
    };

    log.info(
        Component::Brain,
        format!(
            "Verdict {:?} for {}: {}{}",
            decision.verdict,
            result.url,
            decision.next_action,
            decision
                .reasoning
                .as_deref()
                .map(|r| format!(" ({})", r))
                .unwrap_or_default()
        ),
    );

    decision
}

/// Writes a decision into the state for the planner's next turn
///
/// `CONTINUE` leaves `last_result.adaptation` empty. The cycle-delay hint
/// keeps the smallest value seen during the crawl.
pub fn apply_decision(state: &mut CrawlState, decision: BrainDecision, retry_wait_default_ms: u64) {
    if let Some(delay) = decision.cycle_delay_seconds {
        state.cycle_delay_hint = Some(state.cycle_delay_hint.map_or(delay, |d| d.min(delay)));
    }

    let Some(last) = state.last_result.as_mut() else {
        return;
    };

    if decision.next_action == Adaptation::Continue {
        last.adaptation = None;
        return;
    }

    last.adaptation = Some(decision.next_action);
    last.suggested_url = decision.suggested_url;
    last.wait_ms = match (decision.wait_seconds, decision.next_action) {
        (Some(secs), _) => Some(secs.saturating_mul(1000)),
        (None, Adaptation::RetryCycleSoon) => Some(retry_wait_default_ms),
        (None, _) => None,
    };
}
