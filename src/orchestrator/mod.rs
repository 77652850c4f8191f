//! Source orchestration
//!
//! This module contains the per-source crawl loop and the cycle scheduler:
//! - `run_crawl` executes planner actions for one source until stop, cap, or
//!   a terminal empty frontier
//! - `Orchestrator` runs cycles over every enabled source, in bounded-parallel
//!   batches when several are enabled, and tears down exactly once

mod crawl;
mod scheduler;

pub use crawl::{run_crawl, CrawlOptions, CrawlSummary};
pub use scheduler::{CycleReport, Orchestrator, RunReport, SourceOutcome};

use crate::capabilities::Capabilities;
use crate::config::{Config, CrawlerConfig, SchedulerConfig};
use crate::frontier::CrawlLimits;

/// Everything a crawl task reads but never mutates
#[derive(Clone)]
pub struct CrawlContext {
    pub caps: Capabilities,
    pub crawler: CrawlerConfig,
    pub scheduler: SchedulerConfig,
}

impl CrawlContext {
    pub fn new(caps: Capabilities, config: &Config) -> Self {
        Self {
            caps,
            crawler: config.crawler.clone(),
            scheduler: config.scheduler.clone(),
        }
    }

    pub fn limits(&self) -> CrawlLimits {
        CrawlLimits::from(&self.crawler)
    }
}
