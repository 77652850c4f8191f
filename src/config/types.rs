use serde::Deserialize;

/// Main configuration structure for Kite-Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub advisory: AdvisoryConfig,
    pub output: OutputConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceEntry>,
}

/// Per-source crawl behavior
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum discovery depth from the source's start URL
    pub max_depth: u32,

    /// Extracted-job cap per source per run
    pub max_jobs_per_source: usize,

    /// Adaptation-driven retries allowed per crawl
    pub max_retries: u32,

    /// URL corrections allowed per source across crawls
    pub max_url_corrections: u32,

    /// Frontier refills allowed per crawl before an empty frontier ends it
    pub max_refills: u32,

    /// Number of pagination URLs synthesized from a listing page
    pub pagination_seeds: usize,

    /// Priority of organically discovered links (lower is visited first)
    pub link_priority: u32,

    /// Priority of synthesized pagination URLs
    pub pagination_priority: u32,

    /// Lower bound of the jittered content-settle wait (milliseconds)
    pub settle_min_ms: u64,

    /// Upper bound of the jittered content-settle wait (milliseconds)
    pub settle_max_ms: u64,

    /// Extra wait for single-page-app sources (milliseconds)
    pub hydration_ms: u64,

    /// Selector awaited on single-page-app sources
    pub hydration_selector: String,

    /// Domains whose pages need hydration before reading
    pub spa_domains: Vec<String>,

    /// Navigation timeout (milliseconds)
    pub navigation_timeout_ms: u64,

    /// Raw content size above which prior-capture recovery is attempted
    pub large_content_bytes: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: 2,
            max_jobs_per_source: 500,
            max_retries: 2,
            max_url_corrections: 3,
            max_refills: 3,
            pagination_seeds: 4,
            link_priority: 10,
            pagination_priority: 5,
            settle_min_ms: 800,
            settle_max_ms: 2500,
            hydration_ms: 3000,
            hydration_selector: "a[href]".to_string(),
            spa_domains: Vec::new(),
            navigation_timeout_ms: 30_000,
            large_content_bytes: 200_000,
        }
    }
}

/// Cycle scheduling configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SchedulerConfig {
    /// Maximum number of sources crawled concurrently
    pub parallel_sources: usize,

    /// Sleep between cycles (seconds)
    pub cycle_delay_secs: u64,

    /// How long a human has to clear a captcha or login wall (seconds)
    pub human_timeout_secs: u64,

    /// Bound on a single advisory call (milliseconds)
    pub advisory_timeout_ms: u64,

    /// Wait used for RETRY_CYCLE_SOON when the advisory gives none (milliseconds)
    pub retry_wait_default_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            parallel_sources: 3,
            cycle_delay_secs: 1800,
            human_timeout_secs: 300,
            advisory_timeout_ms: 15_000,
            retry_wait_default_ms: 60_000,
        }
    }
}

/// Browser capability configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BrowserConfig {
    /// User agent presented by the HTTP browser
    pub user_agent: String,

    /// Prefer a visible session for single-source runs
    pub visible: bool,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("kite-harvest/{}", env!("CARGO_PKG_VERSION")),
            visible: false,
        }
    }
}

/// Advisory configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct AdvisoryConfig {
    /// HTTP endpoint of the advisory service; the local rule advisor is used when absent
    pub endpoint: Option<String>,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite database file
    #[serde(rename = "database-path")]
    pub database_path: String,
}

/// A job source declared in the configuration file
#[derive(Debug, Clone, Deserialize)]
pub struct SourceEntry {
    /// Human-readable source name
    pub name: String,

    /// Start URL
    pub url: String,

    /// Stable identifier used to upsert the source into the store
    pub slug: String,

    /// Source type (e.g. "job-board", "careers-page", "ats")
    #[serde(rename = "type", default = "default_source_type")]
    pub source_type: String,

    /// Whether the source takes part in crawling
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_source_type() -> String {
    "job-board".to_string()
}

fn default_enabled() -> bool {
    true
}
