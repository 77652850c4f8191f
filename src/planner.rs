//! Planner: a pure decision function from crawl state to the next action
//!
//! `decide` performs no I/O and mutates nothing. The executor in the
//! orchestrator carries out the action, consumes `last_result`, and updates
//! the counters the planner consults (retries, corrections, walls attempted).
//!
//! # Decision Order
//!
//! 1. Stop requested → `CycleDone(StopRequested)`
//! 2. Job cap reached → `CycleDone(CapReached)`
//! 3. An adaptation on the last result, if still within its budget
//! 4. The highest-priority frontier entry → `VisitUrl`
//! 5. Empty frontier → `CycleDone(FrontierEmpty)`

use crate::brain::DEFAULT_RETRY_WAIT_MS;
use crate::frontier::CrawlState;
use crate::model::{Adaptation, VisitResult};
use crate::url::frontier_key;
use std::fmt;

/// The one thing a crawl does next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    VisitUrl {
        url: String,
        depth: u32,
    },
    TriggerLoginWall {
        url: String,
    },
    TriggerCaptcha {
        url: String,
    },
    ApplyUrlCorrection {
        url: String,
        source_name: String,
    },
    RetryWait {
        wait_ms: u64,
        reason: String,
        retry_url: String,
        retry_depth: u32,
    },
    CycleDone(DoneReason),
}

/// Why a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    StopRequested,
    CapReached,
    /// Recoverable: the caller refills the frontier while its budget lasts
    FrontierEmpty,
}

impl fmt::Display for DoneReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::StopRequested => "Stop requested",
            Self::CapReached => "Job cap reached",
            Self::FrontierEmpty => "frontier empty",
        };
        f.write_str(reason)
    }
}

/// Chooses the next action for a crawl
pub fn decide(state: &CrawlState) -> Action {
    if state.stop_requested() {
        return Action::CycleDone(DoneReason::StopRequested);
    }
    if state.cap_reached() {
        return Action::CycleDone(DoneReason::CapReached);
    }

    if let Some(action) = state
        .last_result
        .as_ref()
        .and_then(|last| adaptation_action(state, last))
    {
        return action;
    }

    match state.frontier.peek() {
        Some(entry) => Action::VisitUrl {
            url: entry.url.clone(),
            depth: entry.depth,
        },
        None => Action::CycleDone(DoneReason::FrontierEmpty),
    }
}

/// Translates the last result's adaptation, or None when absent or over budget
fn adaptation_action(state: &CrawlState, last: &VisitResult) -> Option<Action> {
    let limits = &state.limits;
    let wall_untried = || !state.walls_attempted.contains(&frontier_key(&last.url));

    match last.adaptation? {
        Adaptation::Continue => None,
        Adaptation::RetryExtraction if state.retry_count < limits.max_retries => {
            Some(Action::VisitUrl {
                url: last.url.clone(),
                depth: last.depth,
            })
        }
        Adaptation::RetryCycleSoon if state.retry_count < limits.max_retries => {
            Some(Action::RetryWait {
                wait_ms: last.wait_ms.unwrap_or(DEFAULT_RETRY_WAIT_MS),
                reason: last
                    .error
                    .clone()
                    .unwrap_or_else(|| "advisory requested a retry".to_string()),
                retry_url: last.url.clone(),
                retry_depth: last.depth,
            })
        }
        Adaptation::TryNewUrl if state.url_correction_attempts < limits.max_url_corrections => {
            Some(Action::ApplyUrlCorrection {
                url: last.url.clone(),
                source_name: state.source_name.clone(),
            })
        }
        Adaptation::CaptchaHumanSolve if wall_untried() => Some(Action::TriggerCaptcha {
            url: last.url.clone(),
        }),
        Adaptation::LoginWallHuman if wall_untried() => Some(Action::TriggerLoginWall {
            url: last.url.clone(),
        }),
        // Over budget: fall through to the frontier
        _ => None,
    }
}
