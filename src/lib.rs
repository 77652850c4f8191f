//! Kite-Harvest: an adaptive job-posting crawler core
//!
//! This crate drives a frontier-based crawl per configured job source: it plans
//! the next action, visits pages through a browser capability, extracts and
//! upserts postings, asks an advisory for adaptations, hands captcha and login
//! walls to a human, and repairs broken seed URLs. Several sources can run in
//! bounded-parallel batches under one cancellation handle.

pub mod brain;
pub mod capabilities;
pub mod config;
pub mod correction;
pub mod events;
pub mod frontier;
pub mod human;
pub mod jobs;
pub mod model;
pub mod orchestrator;
pub mod pipeline;
pub mod planner;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Kite-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Capability error: {0}")]
    Capability(#[from] capabilities::CapabilityError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The global stop signal was observed at a suspension point
    #[error("Crawl cancelled")]
    Cancelled,
}

impl HarvestError {
    /// Returns true if this error is the cancellation marker
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Kite-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use frontier::{CrawlState, Frontier, FrontierEntry};
pub use model::{Adaptation, PageType, Source, VisitResult};
pub use orchestrator::{run_crawl, CrawlOptions, CrawlSummary, Orchestrator};
pub use planner::{decide, Action, DoneReason};
pub use url::{extract_domain, frontier_key, normalize_url};
