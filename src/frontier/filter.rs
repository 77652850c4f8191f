use super::queue::Frontier;
use crate::url::{frontier_key, is_same_site, is_static_asset};
use std::collections::HashSet;
use url::Url;

/// What a discovered link is checked against
pub struct FilterContext<'a> {
    pub source_domain: &'a str,
    pub url_seen: &'a HashSet<String>,
    pub frontier: &'a Frontier,
    pub current_depth: u32,
    pub max_depth: u32,
}

/// Restricts discovered links to the ones worth queueing
///
/// A candidate survives when it parses as HTTP(S), belongs to the source's
/// site, is not a static asset, is neither seen nor queued, and the child
/// depth `current_depth + 1` is within `max_depth`. Duplicates among the
/// candidates themselves are dropped, keeping the first occurrence.
pub fn filter_links(candidates: &[String], ctx: &FilterContext<'_>) -> Vec<String> {
    if ctx.current_depth + 1 > ctx.max_depth {
        return Vec::new();
    }

    let mut kept_keys = HashSet::new();
    let mut kept = Vec::new();

    for candidate in candidates {
        let url = match Url::parse(candidate) {
            Ok(u) if u.scheme() == "http" || u.scheme() == "https" => u,
            _ => continue,
        };

        if !is_same_site(ctx.source_domain, &url) || is_static_asset(&url) {
            continue;
        }

        let key = frontier_key(candidate);
        if ctx.url_seen.contains(&key) || ctx.frontier.contains(&key) {
            continue;
        }

        if kept_keys.insert(key) {
            kept.push(candidate.clone());
        }
    }

    kept
}
