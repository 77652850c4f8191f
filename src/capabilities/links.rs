//! Link extraction, normalization, and pagination seed synthesis

use super::LinkTools;
use crate::url::normalize_url;
use scraper::{Html, Selector};
use url::Url;

/// Query parameters recognised as a page number
const PAGE_PARAMS: &[&str] = &["page", "p", "pg", "pagenumber", "page_num"];

/// Default `LinkTools` built on `scraper` and `url`
#[derive(Debug, Clone, Copy, Default)]
pub struct ScraperLinkTools;

impl LinkTools for ScraperLinkTools {
    /// Extracts absolute http(s) links from `<a href>` and canonical links
    ///
    /// **Exclude:**
    /// - `<a href="..." download>`
    /// - `javascript:`, `mailto:`, `tel:` links
    /// - Data URIs and fragment-only anchors
    fn extract_links(&self, html: &str, base_url: &str) -> Vec<String> {
        let Ok(base_url) = Url::parse(base_url) else {
            return Vec::new();
        };
        let document = Html::parse_document(html);
        let mut links = Vec::new();

        if let Ok(a_selector) = Selector::parse("a[href]") {
            for element in document.select(&a_selector) {
                if element.value().attr("download").is_some() {
                    continue;
                }
                if let Some(absolute_url) = element
                    .value()
                    .attr("href")
                    .and_then(|href| resolve_link(href, &base_url))
                {
                    links.push(absolute_url);
                }
            }
        }

        if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
            for element in document.select(&canonical_selector) {
                if let Some(absolute_url) = element
                    .value()
                    .attr("href")
                    .and_then(|href| resolve_link(href, &base_url))
                {
                    links.push(absolute_url);
                }
            }
        }

        links
    }

    fn normalize(&self, url: &str) -> String {
        normalize_url(url)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| url.trim().to_string())
    }

    /// Synthesizes the next `max_count` page URLs
    ///
    /// An existing numeric page parameter or `/page/N` path segment is
    /// incremented; otherwise `page=2..` is appended.
    fn generate_pagination_seeds(&self, url: &str, max_count: usize) -> Vec<String> {
        if max_count == 0 {
            return Vec::new();
        }
        let Ok(url) = Url::parse(url) else {
            return Vec::new();
        };

        if let Some((param, current)) = page_param(&url) {
            return (1..=max_count as u64)
                .map(|step| with_param(&url, &param, current + step))
                .collect();
        }

        if let Some((index, current)) = page_path_segment(&url) {
            return (1..=max_count as u64)
                .filter_map(|step| with_path_segment(&url, index, current + step))
                .collect();
        }

        (2..=max_count as u64 + 1)
            .map(|page| with_param(&url, "page", page))
            .collect()
    }
}

/// Resolves a link href to an absolute URL and validates it
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    let absolute_url = base_url.join(href).ok()?;
    if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
        Some(absolute_url.to_string())
    } else {
        None
    }
}

fn page_param(url: &Url) -> Option<(String, u64)> {
    url.query_pairs().find_map(|(key, value)| {
        let lower = key.to_ascii_lowercase();
        if PAGE_PARAMS.contains(&lower.as_str()) {
            value.parse::<u64>().ok().map(|n| (key.into_owned(), n))
        } else {
            None
        }
    })
}

fn with_param(url: &Url, param: &str, value: u64) -> String {
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != param)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    let mut next = url.clone();
    next.set_fragment(None);
    {
        let mut query = next.query_pairs_mut();
        query.clear();
        for (key, value) in &pairs {
            query.append_pair(key, value);
        }
        query.append_pair(param, &value.to_string());
    }
    next.to_string()
}

/// Finds a `/page/N` path segment, returning the index of N
fn page_path_segment(url: &Url) -> Option<(usize, u64)> {
    let segments: Vec<&str> = url.path_segments()?.collect();
    segments.windows(2).enumerate().find_map(|(i, pair)| {
        if pair[0].eq_ignore_ascii_case("page") {
            pair[1].parse::<u64>().ok().map(|n| (i + 1, n))
        } else {
            None
        }
    })
}

fn with_path_segment(url: &Url, index: usize, value: u64) -> Option<String> {
    let mut segments: Vec<String> = url.path_segments()?.map(String::from).collect();
    *segments.get_mut(index)? = value.to_string();

    let mut next = url.clone();
    next.set_fragment(None);
    next.set_path(&format!("/{}", segments.join("/")));
    Some(next.to_string())
}
