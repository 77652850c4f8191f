//! Contracts of the external collaborators the crawl core orchestrates
//!
//! Every capability is a trait object so the orchestrator can be wired with
//! the default implementations in this module, with remote services, or with
//! test doubles:
//! - Browser automation (`Browser`, `BrowserSession`)
//! - Content cleaning, posting extraction, page classification
//! - Link tools (link extraction, normalization, pagination seeds)
//! - URL resolution and source validation
//! - Advisory reasoning
//! - The human "resolved" signal for captchas and login walls

mod advisor;
mod browser;
mod content;
mod links;
mod remote;
mod signal;

pub use advisor::{HttpAdvisor, RuleAdvisor};
pub use browser::{build_http_client, HttpBrowser};
pub use content::{HeuristicClassifier, HtmlCleaner, StructuredExtractor};
pub use links::ScraperLinkTools;
pub use remote::{HttpSourceValidator, HttpUrlResolver};
pub use signal::ManualSignal;

use crate::brain::{AdvisoryContext, BrainDecision};
use crate::events::EventSink;
use crate::jobs::RawListing;
use crate::model::PageType;
use crate::storage::Store;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by capabilities
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("{operation} timed out after {millis}ms")]
    Timeout { operation: String, millis: u64 },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Browser session error: {0}")]
    Session(String),

    #[error("Capability unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for capability calls
pub type CapabilityResult<T> = Result<T, CapabilityError>;

/// How a browser session is presented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Shown to the operator (human-in-the-loop, single-source runs)
    Visible,
    /// Background automation
    Headless,
}

/// Opens browser sessions
#[async_trait]
pub trait Browser: Send + Sync {
    async fn open(&self, visibility: Visibility) -> CapabilityResult<Box<dyn BrowserSession>>;
}

/// One browser session, exclusively owned by a single crawl task at a time
#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> CapabilityResult<()>;

    /// Waits until the selector matches; returns false if it never did
    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration)
        -> CapabilityResult<bool>;

    async fn read_rendered_content(&mut self) -> CapabilityResult<String>;

    async fn close(&mut self) -> CapabilityResult<()>;
}

/// Output of the cleaning capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanedContent {
    pub cleaned_html: String,
    pub original_size: usize,
    pub cleaned_size: usize,
    pub elements_removed: usize,
}

#[async_trait]
pub trait Cleaner: Send + Sync {
    async fn clean(&self, raw_html: &str, base_url: &str) -> CapabilityResult<CleanedContent>;
}

/// Hints passed to the extraction capability
#[derive(Debug, Clone, Default)]
pub struct ExtractHints {
    pub source_slug: String,
    pub source_type: String,
    /// Set when extracting from un-stripped raw content
    pub raw_content: bool,
}

/// Output of the extraction capability
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub listings: Vec<RawListing>,
    pub strategy: String,
}

#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(
        &self,
        html: &str,
        url: &str,
        hints: &ExtractHints,
    ) -> CapabilityResult<Extraction>;
}

/// Output of the classification capability
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub page_type: PageType,
    pub confidence: f32,
    pub method: String,
}

#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, html: &str, url: &str) -> CapabilityResult<Classification>;
}

/// Link extraction, normalization, and pagination synthesis
pub trait LinkTools: Send + Sync {
    fn extract_links(&self, html: &str, base_url: &str) -> Vec<String>;

    fn normalize(&self, url: &str) -> String;

    fn generate_pagination_seeds(&self, url: &str, max_count: usize) -> Vec<String>;
}

/// Output of the URL resolution capability
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub corrected_url: Option<String>,
    pub method: String,
    pub attempts_made: u32,
}

#[async_trait]
pub trait UrlResolver: Send + Sync {
    async fn resolve(
        &self,
        broken_url: &str,
        source_name: &str,
        attempts_so_far: u32,
    ) -> CapabilityResult<Resolution>;
}

/// Output of the source validation capability
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    pub is_valid: bool,
    pub status_code: Option<u16>,
    pub error_message: Option<String>,
}

#[async_trait]
pub trait SourceValidator: Send + Sync {
    async fn validate(&self, source_id: i64, url: &str) -> CapabilityResult<Validation>;
}

/// Advisory reasoning over a visit's outcome; callers default to CONTINUE on failure
#[async_trait]
pub trait Advisor: Send + Sync {
    async fn analyze(&self, context: &AdvisoryContext) -> CapabilityResult<BrainDecision>;
}

/// External "resolved" signal for a blocked URL
#[async_trait]
pub trait HumanSignal: Send + Sync {
    /// Resolves once a human reports the blocking URL cleared
    async fn wait_resolved(&self, source_id: i64, url: &str) -> CapabilityResult<()>;
}

/// Every collaborator a crawl needs
#[derive(Clone)]
pub struct Capabilities {
    pub browser: Arc<dyn Browser>,
    pub cleaner: Arc<dyn Cleaner>,
    pub extractor: Arc<dyn Extractor>,
    pub classifier: Arc<dyn Classifier>,
    pub links: Arc<dyn LinkTools>,
    pub resolver: Arc<dyn UrlResolver>,
    pub validator: Arc<dyn SourceValidator>,
    pub advisor: Arc<dyn Advisor>,
    pub signal: Arc<dyn HumanSignal>,
    pub store: Arc<dyn Store>,
    pub events: Arc<dyn EventSink>,
}
