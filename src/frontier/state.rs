use super::entry::FrontierEntry;
use super::queue::Frontier;
use crate::config::CrawlerConfig;
use crate::model::{Source, VisitResult};
use crate::url::{extract_domain, frontier_key};
use std::collections::HashSet;
use tokio_util::sync::CancellationToken;

/// Limits applied to one source's crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlLimits {
    pub max_depth: u32,
    pub job_cap: usize,
    pub max_retries: u32,
    pub max_url_corrections: u32,
    pub max_refills: u32,
}

impl From<&CrawlerConfig> for CrawlLimits {
    fn from(config: &CrawlerConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            job_cap: config.max_jobs_per_source,
            max_retries: config.max_retries,
            max_url_corrections: config.max_url_corrections,
            max_refills: config.max_refills,
        }
    }
}

/// Mutable crawl state of one source
///
/// Created when the source's crawl starts, private to that crawl task, and
/// dropped when it ends. A normalized URL is never both queued and seen, except
/// transiently inside `requeue_front`.
#[derive(Debug)]
pub struct CrawlState {
    pub source_id: i64,
    pub source_name: String,
    pub source_slug: String,
    pub source_type: String,
    pub start_url: String,
    pub source_domain: String,
    pub frontier: Frontier,
    pub url_seen: HashSet<String>,
    pub limits: CrawlLimits,
    pub retry_count: u32,
    pub url_correction_attempts: u32,
    pub refills: u32,
    pub jobs_extracted: usize,
    /// URLs already handed to a human during this crawl
    pub walls_attempted: HashSet<String>,
    pub last_result: Option<VisitResult>,
    /// Inter-cycle delay suggested by the advisory (seconds)
    pub cycle_delay_hint: Option<u64>,
    stop: CancellationToken,
}

impl CrawlState {
    /// Creates the state for a source and seeds its start URL at depth 0
    pub fn new(source: &Source, limits: CrawlLimits, stop: CancellationToken) -> Self {
        let source_domain = ::url::Url::parse(&source.url)
            .ok()
            .and_then(|u| extract_domain(&u))
            .unwrap_or_default();

        let mut state = Self {
            source_id: source.id,
            source_name: source.name.clone(),
            source_slug: source.slug.clone(),
            source_type: source.source_type.clone(),
            start_url: source.url.clone(),
            source_domain,
            frontier: Frontier::new(),
            url_seen: HashSet::new(),
            limits,
            retry_count: 0,
            url_correction_attempts: 0,
            refills: 0,
            jobs_extracted: 0,
            walls_attempted: HashSet::new(),
            last_result: None,
            cycle_delay_hint: None,
            stop,
        };
        let start = state.start_url.clone();
        state.push(&start, 0, 0);
        state
    }

    /// Returns true once the global stop signal has been raised
    pub fn stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// The cancellation handle shared with every suspension point of this crawl
    pub fn stop_token(&self) -> &CancellationToken {
        &self.stop
    }

    /// Returns true once the extracted-job counter reached the cap
    pub fn cap_reached(&self) -> bool {
        self.jobs_extracted >= self.limits.job_cap
    }

    /// Queues a URL unless it is seen, already queued, or deeper than `max_depth`
    pub fn push(&mut self, url: &str, depth: u32, priority: u32) -> bool {
        if depth > self.limits.max_depth {
            return false;
        }
        let key = frontier_key(url);
        if self.url_seen.contains(&key) {
            return false;
        }
        self.frontier.push(url, key, depth, priority)
    }

    /// Clears the URL's seen flag and queues it ahead of everything else
    pub fn requeue_front(&mut self, url: &str, depth: u32) {
        let key = frontier_key(url);
        self.url_seen.remove(&key);
        self.frontier.push_front(url, key, depth.min(self.limits.max_depth));
    }

    /// Pops the next entry and marks it seen
    pub fn take_next(&mut self) -> Option<FrontierEntry> {
        let entry = self.frontier.pop()?;
        self.url_seen.insert(entry.key.clone());
        Some(entry)
    }

    /// Marks a URL seen and purges any queued copies, returning how many were purged
    pub fn mark_seen(&mut self, url: &str) -> usize {
        let key = frontier_key(url);
        let purged = self.frontier.purge(&key);
        self.url_seen.insert(key);
        purged
    }

    /// Clears the seen flag of a URL
    pub fn forget(&mut self, url: &str) {
        self.url_seen.remove(&frontier_key(url));
    }

    pub fn is_seen(&self, url: &str) -> bool {
        self.url_seen.contains(&frontier_key(url))
    }

    pub fn is_queued(&self, url: &str) -> bool {
        self.frontier.contains(&frontier_key(url))
    }
}
