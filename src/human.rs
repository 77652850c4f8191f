//! Human-in-the-loop handlers for captchas and login walls
//!
//! The blocking URL is opened in a separate, visible browser session. The
//! crawl then waits for the human "resolved" signal, racing it against the
//! human timeout and the stop signal. A resolved wall is processed like a
//! normal visit; anything else marks the URL seen and blocked so it is never
//! retried. The side session is closed on every path.

use crate::capabilities::{BrowserSession, Visibility};
use crate::events::{ActivityLog, Component};
use crate::frontier::CrawlState;
use crate::model::{PageType, VisitResult};
use crate::orchestrator::CrawlContext;
use crate::pipeline::{capture_and_process, until_stopped};
use crate::storage::VisitStatus;
use crate::url::frontier_key;
use crate::{HarvestError, Result};
use std::fmt;
use std::time::Duration;

/// Kind of wall blocking a page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wall {
    LoginWall,
    Captcha,
}

impl Wall {
    fn page_type(self) -> PageType {
        match self {
            Self::LoginWall => PageType::LoginWall,
            Self::Captcha => PageType::Captcha,
        }
    }
}

impl fmt::Display for Wall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoginWall => f.write_str("login wall"),
            Self::Captcha => f.write_str("captcha"),
        }
    }
}

/// Why a wall was not cleared
#[derive(Debug)]
enum WallFailure {
    TimedOut(Duration),
    Error(HarvestError),
}

impl fmt::Display for WallFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TimedOut(d) => write!(f, "no human response within {}s", d.as_secs()),
            Self::Error(e) => write!(f, "{}", e),
        }
    }
}

impl WallFailure {
    fn is_cancelled(&self) -> bool {
        matches!(self, Self::Error(e) if e.is_cancelled())
    }
}

impl From<HarvestError> for WallFailure {
    fn from(e: HarvestError) -> Self {
        Self::Error(e)
    }
}

/// Handles a `TRIGGER_LOGIN_WALL` or `TRIGGER_CAPTCHA` action
pub async fn handle_wall(
    ctx: &CrawlContext,
    log: &ActivityLog,
    state: &mut CrawlState,
    wall: Wall,
    url: &str,
    depth: u32,
) -> VisitResult {
    state.walls_attempted.insert(frontier_key(url));
    log.warn(
        Component::Human,
        format!(
            "{} at {}: clear it in the browser window, then signal resolved",
            wall, url
        ),
    );

    let mut session = match ctx.caps.browser.open(Visibility::Visible).await {
        Ok(session) => session,
        Err(e) => {
            let failure = WallFailure::Error(e.into());
            return give_up(ctx, log, state, wall, url, depth, failure).await;
        }
    };

    let outcome = solve(ctx, log, state, session.as_mut(), wall, url, depth).await;

    if let Err(e) = session.close().await {
        log.warn(
            Component::Human,
            format!("Closing the {} session failed: {}", wall, e),
        );
    }

    match outcome {
        Ok(result) => {
            state.mark_seen(url);
            log.info(
                Component::Human,
                format!(
                    "{} at {} cleared: {} jobs extracted",
                    wall, url, result.jobs_count
                ),
            );
            result
        }
        Err(failure) => give_up(ctx, log, state, wall, url, depth, failure).await,
    }
}

async fn solve(
    ctx: &CrawlContext,
    log: &ActivityLog,
    state: &mut CrawlState,
    session: &mut dyn BrowserSession,
    wall: Wall,
    url: &str,
    depth: u32,
) -> std::result::Result<VisitResult, WallFailure> {
    let stop = state.stop_token().clone();
    let nav_timeout = Duration::from_millis(ctx.crawler.navigation_timeout_ms);
    until_stopped(&stop, session.navigate(url, nav_timeout))
        .await?
        .map_err(HarvestError::from)?;

    let human_timeout = Duration::from_secs(ctx.scheduler.human_timeout_secs);
    let waited: Result<()> = tokio::select! {
        _ = stop.cancelled() => Err(HarvestError::Cancelled),
        _ = tokio::time::sleep(human_timeout) => {
            return Err(WallFailure::TimedOut(human_timeout));
        }
        resolved = ctx.caps.signal.wait_resolved(state.source_id, url) => {
            resolved.map_err(HarvestError::from)
        }
    };
    waited?;

    log.info(
        Component::Human,
        format!("{} at {} reported resolved", wall, url),
    );
    Ok(capture_and_process(ctx, log, state, session, url, depth).await?)
}

async fn give_up(
    ctx: &CrawlContext,
    log: &ActivityLog,
    state: &mut CrawlState,
    wall: Wall,
    url: &str,
    depth: u32,
    failure: WallFailure,
) -> VisitResult {
    let purged = state.mark_seen(url);

    if failure.is_cancelled() {
        log.info(
            Component::Human,
            format!("Stop requested while waiting on {} at {}", wall, url),
        );
    } else {
        log.warn(
            Component::Human,
            format!(
                "Abandoning {} at {} ({}); purged {} queued copies",
                wall, url, failure, purged
            ),
        );
        record_blocked(ctx, log, state, url).await;
    }

    VisitResult {
        page_type: wall.page_type(),
        ..VisitResult::failed(url, depth, failure.to_string())
    }
}

async fn record_blocked(ctx: &CrawlContext, log: &ActivityLog, state: &CrawlState, url: &str) {
    if let Err(e) = ctx
        .caps
        .store
        .mark_visited(state.source_id, url, VisitStatus::Blocked)
        .await
    {
        log.warn(
            Component::Human,
            format!("Could not record blocked URL: {}", e),
        );
    }
}
