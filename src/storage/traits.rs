//! Storage traits and error types
//!
//! This module defines the persistence contract the crawl core relies on.
//! Writes coming from concurrently running sources are idempotent upserts
//! keyed by source, so implementations only need per-call atomicity.

use crate::jobs::NormalizedJob;
use crate::model::Source;
use crate::storage::{CaptureMeta, CaptureRecord, ScrapeStatus, UpsertOutcome, VisitStatus};
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Source not found: {0}")]
    SourceNotFound(i64),

    #[error("Capture not found: {0}")]
    CaptureNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence operations needed by the crawl core
#[async_trait]
pub trait Store: Send + Sync {
    // ===== Sources =====

    /// Lists sources enabled for scraping, ordered by ID
    async fn list_enabled_sources(&self) -> StorageResult<Vec<Source>>;

    /// Gets a source by ID
    async fn get_source(&self, source_id: i64) -> StorageResult<Source>;

    /// Persists a corrected start URL
    async fn update_source_url(&self, source_id: i64, url: &str) -> StorageResult<()>;

    /// Records the outcome of the source's latest scrape
    async fn set_scrape_status(
        &self,
        source_id: i64,
        status: ScrapeStatus,
        message: Option<&str>,
    ) -> StorageResult<()>;

    // ===== Captures =====

    /// Stores the raw rendered content of a page, returning the capture ID
    async fn save_raw_capture(&self, source_id: i64, url: &str, raw_html: &str)
        -> StorageResult<i64>;

    /// Attaches the cleaned content to a capture
    async fn save_cleaned_capture(&self, capture_id: i64, cleaned_html: &str)
        -> StorageResult<()>;

    /// Updates the classification and extraction results of a capture
    async fn update_capture_meta(&self, capture_id: i64, meta: &CaptureMeta)
        -> StorageResult<()>;

    /// Returns the prior capture with the most extracted jobs, if any had jobs
    async fn best_capture(&self, source_id: i64) -> StorageResult<Option<CaptureRecord>>;

    /// Lists all captures of a source, newest first
    async fn list_captures(&self, source_id: i64) -> StorageResult<Vec<CaptureRecord>>;

    // ===== Job cache =====

    /// Inserts or refreshes a posting keyed by (source, dedupe key)
    async fn upsert_job(&self, job: &NormalizedJob) -> StorageResult<UpsertOutcome>;

    // ===== Visited ledger =====

    /// Records a URL in the source's visited ledger
    async fn mark_visited(&self, source_id: i64, url: &str, status: VisitStatus)
        -> StorageResult<()>;

    /// Lists ledger URLs of a source, optionally restricted to one status
    async fn list_visited(
        &self,
        source_id: i64,
        status: Option<VisitStatus>,
    ) -> StorageResult<Vec<String>>;
}
