//! URL handling module for Kite-Harvest
//!
//! This module provides URL normalization, the frontier deduplication key,
//! domain extraction and matching, and static-asset detection.

mod domain;
mod normalize;

// Re-export main functions
pub use domain::{domain_matches, extract_domain, is_same_site};
pub use normalize::{frontier_key, is_static_asset, normalize_url};
