//! Core data types shared by the planner, pipeline, and handlers

use serde::{Deserialize, Serialize};
use std::fmt;

/// A configured job source
///
/// Sources are owned by the store. The crawl core only reads them, except
/// URL self-correction, which writes a repaired start URL back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub slug: String,
    pub source_type: String,
    pub enabled_for_scraping: bool,
}

/// Page type assigned by the classification capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    /// A page listing several postings
    JobList,
    /// Search results over postings
    SearchResults,
    /// A company careers landing page
    CareersLanding,
    /// A single posting
    JobDetail,
    /// A login form blocks the content
    LoginWall,
    /// A bot challenge blocks the content
    Captcha,
    /// Nothing job related
    Irrelevant,
    /// Not classified
    Unknown,
}

impl PageType {
    /// Returns true for page types that get pagination seeds
    pub fn is_listing(&self) -> bool {
        matches!(
            self,
            Self::JobList | Self::SearchResults | Self::CareersLanding
        )
    }

    /// Returns true if the page blocks access to its content
    pub fn is_blocking(&self) -> bool {
        matches!(self, Self::LoginWall | Self::Captcha)
    }

    /// Converts the page type to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::JobList => "job_list",
            Self::SearchResults => "search_results",
            Self::CareersLanding => "careers_landing",
            Self::JobDetail => "job_detail",
            Self::LoginWall => "login_wall",
            Self::Captcha => "captcha",
            Self::Irrelevant => "irrelevant",
            Self::Unknown => "unknown",
        }
    }

    /// Parses a page type from its database string representation
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "job_list" => Some(Self::JobList),
            "search_results" => Some(Self::SearchResults),
            "careers_landing" => Some(Self::CareersLanding),
            "job_detail" => Some(Self::JobDetail),
            "login_wall" => Some(Self::LoginWall),
            "captcha" => Some(Self::Captcha),
            "irrelevant" => Some(Self::Irrelevant),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// A deviation from "visit the next frontier entry", proposed by the advisory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Adaptation {
    Continue,
    RetryExtraction,
    TryNewUrl,
    CaptchaHumanSolve,
    LoginWallHuman,
    RetryCycleSoon,
}

impl fmt::Display for Adaptation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Continue => "CONTINUE",
            Self::RetryExtraction => "RETRY_EXTRACTION",
            Self::TryNewUrl => "TRY_NEW_URL",
            Self::CaptchaHumanSolve => "CAPTCHA_HUMAN_SOLVE",
            Self::LoginWallHuman => "LOGIN_WALL_HUMAN",
            Self::RetryCycleSoon => "RETRY_CYCLE_SOON",
        };
        f.write_str(name)
    }
}

/// Outcome of one visit or human-in-the-loop handler run
///
/// Consumed by the planner and the advisory on the next turn; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct VisitResult {
    pub url: String,
    pub depth: u32,
    pub capture_id: Option<i64>,
    pub page_type: PageType,
    pub jobs_count: usize,
    pub extraction_strategy: Option<String>,
    pub links_discovered: usize,
    pub content_size: usize,
    pub error: Option<String>,
    pub adaptation: Option<Adaptation>,
    pub suggested_url: Option<String>,
    pub wait_ms: Option<u64>,
}

impl VisitResult {
    /// Creates an empty result for a URL
    pub fn new(url: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.into(),
            depth,
            capture_id: None,
            page_type: PageType::Unknown,
            jobs_count: 0,
            extraction_strategy: None,
            links_discovered: 0,
            content_size: 0,
            error: None,
            adaptation: None,
            suggested_url: None,
            wait_ms: None,
        }
    }

    /// Creates an error result for a URL
    pub fn failed(url: impl Into<String>, depth: u32, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(url, depth)
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}
