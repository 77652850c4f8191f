//! Frontier and URL state
//!
//! Each source's crawl owns a `CrawlState`: a priority frontier of pending
//! URLs plus the set of normalized URLs already processed. This module owns
//! deduplication, depth bounding, link filtering, and refilling an exhausted
//! frontier.

mod entry;
mod filter;
mod queue;
mod repopulate;
mod state;

pub use entry::FrontierEntry;
pub use filter::{filter_links, FilterContext};
pub use queue::{Frontier, FRONT_PRIORITY};
pub use repopulate::{repopulate, RefillStrategy, REFILL_ORDER};
pub use state::{CrawlLimits, CrawlState};
