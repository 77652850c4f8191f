//! Cycle scheduling across sources

use super::crawl::{run_crawl_tracked, CrawlOptions, CrawlSummary};
use super::CrawlContext;
use crate::capabilities::{BrowserSession, Visibility};
use crate::events::{Component, Event, Level};
use crate::model::Source;
use crate::pipeline::sleep_or_stop;
use crate::storage::ScrapeStatus;
use crate::{HarvestError, Result};
use futures::future::join_all;
use std::collections::HashMap;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Outcome of one source within a cycle
#[derive(Debug)]
pub struct SourceOutcome {
    pub source_id: i64,
    pub source_name: String,
    /// Cross-crawl URL correction counter after this crawl, failed or not
    pub url_correction_attempts: u32,
    /// The crawl summary, or the message of the error that made the source fail
    pub result: std::result::Result<CrawlSummary, String>,
}

/// Outcome of one cycle over all enabled sources
#[derive(Debug, Default)]
pub struct CycleReport {
    pub cycle: u32,
    pub outcomes: Vec<SourceOutcome>,
    /// Smallest inter-cycle delay suggested by any source's advisory (seconds)
    pub delay_hint: Option<u64>,
}

impl CycleReport {
    pub fn jobs_extracted(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(|s| s.jobs_extracted)
            .sum()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_err()).count()
    }
}

/// Outcome of a whole run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub cycles: u32,
    pub jobs_extracted: usize,
}

/// Runs crawl cycles over every enabled source
///
/// With several enabled sources, crawls run in concurrent batches of at most
/// `parallel_sources`, each on its own headless session. A single enabled
/// source reuses one long-lived session across cycles.
pub struct Orchestrator {
    ctx: CrawlContext,
    /// Prefer a visible session for single-source runs
    visible: bool,
    /// Cross-crawl URL correction counters by source ID
    correction_attempts: HashMap<i64, u32>,
    shared_session: Option<Box<dyn BrowserSession>>,
}

impl Orchestrator {
    pub fn new(ctx: CrawlContext, visible: bool) -> Self {
        Self {
            ctx,
            visible,
            correction_attempts: HashMap::new(),
            shared_session: None,
        }
    }

    /// Runs cycles until stopped (or after one cycle with `once`), then tears down
    ///
    /// Consumes the orchestrator so teardown happens exactly once, whichever
    /// way the loop ends.
    pub async fn run(mut self, stop: &CancellationToken, once: bool) -> Result<RunReport> {
        let outcome = self.cycle_loop(stop, once).await;
        self.teardown().await;
        outcome
    }

    async fn cycle_loop(&mut self, stop: &CancellationToken, once: bool) -> Result<RunReport> {
        let mut report = RunReport::default();

        loop {
            if stop.is_cancelled() {
                self.emit(Level::Info, "Stop requested before cycle start");
                break;
            }

            let cycle = self.run_cycle(report.cycles + 1, stop).await?;
            report.cycles = cycle.cycle;
            report.jobs_extracted += cycle.jobs_extracted();
            self.emit(
                Level::Info,
                format!(
                    "Cycle {} complete: {} sources, {} jobs, {} failed",
                    cycle.cycle,
                    cycle.outcomes.len(),
                    cycle.jobs_extracted(),
                    cycle.failed()
                ),
            );

            if once || stop.is_cancelled() {
                break;
            }

            let delay = cycle
                .delay_hint
                .unwrap_or(self.ctx.scheduler.cycle_delay_secs);
            self.emit(Level::Info, format!("Sleeping {}s until the next cycle", delay));
            if sleep_or_stop(stop, Duration::from_secs(delay)).await.is_err() {
                self.emit(Level::Info, "Stop requested during inter-cycle sleep");
                break;
            }
        }

        Ok(report)
    }

    /// Runs one cycle over the enabled sources
    pub async fn run_cycle(&mut self, cycle: u32, stop: &CancellationToken) -> Result<CycleReport> {
        let sources = self.ctx.caps.store.list_enabled_sources().await?;
        let mut report = CycleReport {
            cycle,
            ..CycleReport::default()
        };

        match sources.as_slice() {
            [] => self.emit(Level::Warn, "No enabled sources"),
            [source] => {
                self.emit(
                    Level::Info,
                    format!("Cycle {}: crawling {}", cycle, source.name),
                );
                let outcome = self.crawl_on_shared_session(source, cycle, stop).await;
                self.record(&mut report, outcome);
            }
            _ => {
                let batch_size = self.ctx.scheduler.parallel_sources.max(1);
                self.emit(
                    Level::Info,
                    format!(
                        "Cycle {}: crawling {} sources in batches of {}",
                        cycle,
                        sources.len(),
                        batch_size
                    ),
                );
                for batch in sources.chunks(batch_size) {
                    if stop.is_cancelled() {
                        break;
                    }
                    let crawls = batch.iter().map(|source| {
                        let attempts = self.attempts_for(source.id);
                        crawl_on_own_session(&self.ctx, source, cycle, attempts, stop)
                    });
                    let outcomes = join_all(crawls).await;
                    for outcome in outcomes {
                        self.record(&mut report, outcome);
                    }
                }
            }
        }

        Ok(report)
    }

    async fn crawl_on_shared_session(
        &mut self,
        source: &Source,
        cycle: u32,
        stop: &CancellationToken,
    ) -> SourceOutcome {
        let options = CrawlOptions {
            cycle,
            url_correction_attempts: self.attempts_for(source.id),
        };
        let mut session = match self.shared_session.take() {
            Some(session) => session,
            None => {
                let visibility = if self.visible {
                    Visibility::Visible
                } else {
                    Visibility::Headless
                };
                match self.ctx.caps.browser.open(visibility).await {
                    Ok(session) => session,
                    Err(e) => {
                        return source_failed(
                            &self.ctx,
                            source,
                            options.url_correction_attempts,
                            e.into(),
                        )
                        .await
                    }
                }
            }
        };

        let (attempts, result) =
            run_crawl_tracked(&self.ctx, source, session.as_mut(), stop, &options).await;
        if result.is_ok() {
            self.shared_session = Some(session);
        } else if let Err(e) = session.close().await {
            self.emit(
                Level::Warn,
                format!("Closing the session of {} failed: {}", source.name, e),
            );
        }

        settle(&self.ctx, source, attempts, result).await
    }

    fn record(&mut self, report: &mut CycleReport, outcome: SourceOutcome) {
        self.correction_attempts
            .insert(outcome.source_id, outcome.url_correction_attempts);
        if let Ok(summary) = &outcome.result {
            if let Some(hint) = summary.cycle_delay_hint {
                report.delay_hint = Some(report.delay_hint.map_or(hint, |d| d.min(hint)));
            }
        }
        report.outcomes.push(outcome);
    }

    fn attempts_for(&self, source_id: i64) -> u32 {
        self.correction_attempts
            .get(&source_id)
            .copied()
            .unwrap_or(0)
    }

    async fn teardown(&mut self) {
        if let Some(mut session) = self.shared_session.take() {
            if let Err(e) = session.close().await {
                self.emit(Level::Warn, format!("Closing the shared session failed: {}", e));
            }
        }
        self.correction_attempts.clear();
        self.emit(Level::Info, "Teardown complete");
    }

    fn emit(&self, level: Level, message: impl Into<String>) {
        emit(&self.ctx, level, message);
    }
}

/// Crawls one source of a parallel batch on a session it owns exclusively
async fn crawl_on_own_session(
    ctx: &CrawlContext,
    source: &Source,
    cycle: u32,
    url_correction_attempts: u32,
    stop: &CancellationToken,
) -> SourceOutcome {
    let options = CrawlOptions {
        cycle,
        url_correction_attempts,
    };
    let mut session = match ctx.caps.browser.open(Visibility::Headless).await {
        Ok(session) => session,
        Err(e) => return source_failed(ctx, source, url_correction_attempts, e.into()).await,
    };

    let (attempts, result) = run_crawl_tracked(ctx, source, session.as_mut(), stop, &options).await;
    if let Err(e) = session.close().await {
        emit(
            ctx,
            Level::Warn,
            format!("Closing the session of {} failed: {}", source.name, e),
        );
    }

    settle(ctx, source, attempts, result).await
}

async fn settle(
    ctx: &CrawlContext,
    source: &Source,
    url_correction_attempts: u32,
    result: Result<CrawlSummary>,
) -> SourceOutcome {
    match result {
        Ok(summary) => SourceOutcome {
            source_id: source.id,
            source_name: source.name.clone(),
            url_correction_attempts,
            result: Ok(summary),
        },
        Err(e) => source_failed(ctx, source, url_correction_attempts, e).await,
    }
}

/// Marks a source FAILED after an error escaped its crawl
async fn source_failed(
    ctx: &CrawlContext,
    source: &Source,
    url_correction_attempts: u32,
    error: HarvestError,
) -> SourceOutcome {
    let message = error.to_string();
    emit(
        ctx,
        Level::Error,
        format!("Source {} failed: {}", source.name, message),
    );
    if let Err(e) = ctx
        .caps
        .store
        .set_scrape_status(source.id, ScrapeStatus::Failed, Some(&message))
        .await
    {
        emit(
            ctx,
            Level::Error,
            format!("Could not record failure of {}: {}", source.name, e),
        );
    }
    SourceOutcome {
        source_id: source.id,
        source_name: source.name.clone(),
        url_correction_attempts,
        result: Err(message),
    }
}

fn emit(ctx: &CrawlContext, level: Level, message: impl Into<String>) {
    ctx.caps.events.emit(Event {
        component: Component::Orchestrator,
        level,
        source: None,
        message: message.into(),
    });
}
