//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Source configuration and last scrape status
//! - Raw and cleaned page captures with their extraction metadata
//! - The shared job cache
//! - The per-source visited-URL ledger

mod schema;
mod sqlite;
mod traits;

pub use sqlite::{SourceStats, SqliteStore};
pub use traits::{Store, StorageError, StorageResult};

use crate::model::PageType;

/// A stored copy of a fetched page plus its metadata
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRecord {
    pub id: i64,
    pub source_id: i64,
    pub url: String,
    pub raw_html: String,
    pub cleaned_html: Option<String>,
    pub page_type: Option<PageType>,
    pub jobs_count: usize,
    pub extraction_strategy: Option<String>,
    pub captured_at: String,
}

impl CaptureRecord {
    /// Cleaned content when present, raw content otherwise
    pub fn best_html(&self) -> &str {
        self.cleaned_html.as_deref().unwrap_or(&self.raw_html)
    }
}

/// Classification and extraction results attached to a capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureMeta {
    pub page_type: PageType,
    pub jobs_count: usize,
    pub extraction_strategy: Option<String>,
}

/// Whether a job cache upsert created or refreshed a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

/// Status of a URL in the visited ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VisitStatus {
    /// Processed by the visit pipeline
    Visited,
    /// Abandoned behind a captcha or login wall
    Blocked,
}

impl VisitStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Visited => "visited",
            Self::Blocked => "blocked",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "visited" => Some(Self::Visited),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }
}

/// Status of a harvest run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
        }
    }
}

/// Last scrape status of a source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeStatus {
    Running,
    Success,
    Failed,
    Stopped,
}

impl ScrapeStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "success" => Some(Self::Success),
            "failed" => Some(Self::Failed),
            "stopped" => Some(Self::Stopped),
            _ => None,
        }
    }
}
