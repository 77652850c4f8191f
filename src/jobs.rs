//! Job posting normalization
//!
//! Extraction capabilities return loosely filled `RawListing`s. Before they
//! reach the shared job cache they are trimmed, resolved against the page URL,
//! and given a stable dedupe key so repeated sightings upsert the same row.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// A posting as returned by an extraction capability
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawListing {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub salary: Option<String>,
    pub posted_at: Option<String>,
}

/// A posting ready for the job cache
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedJob {
    pub source_id: i64,
    pub dedupe_key: String,
    pub title: String,
    pub company: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub salary: Option<String>,
    pub posted_at: Option<String>,
}

/// Normalizes a raw listing; listings without a title are dropped
pub fn normalize_listing(source_id: i64, raw: &RawListing, page_url: &str) -> Option<NormalizedJob> {
    let title = clean_text(raw.title.as_deref())?;
    let company = clean_text(raw.company.as_deref());
    let location = clean_text(raw.location.as_deref());
    let url = raw
        .url
        .as_deref()
        .and_then(|href| resolve_posting_url(href, page_url));

    let dedupe_key = dedupe_key(&title, company.as_deref(), location.as_deref(), url.as_deref());

    Some(NormalizedJob {
        source_id,
        dedupe_key,
        title,
        company,
        location,
        url,
        description: clean_text(raw.description.as_deref()),
        salary: clean_text(raw.salary.as_deref()),
        posted_at: clean_text(raw.posted_at.as_deref()),
    })
}

/// Collapses whitespace; empty strings become None
fn clean_text(value: Option<&str>) -> Option<String> {
    let collapsed = value?.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

fn resolve_posting_url(href: &str, page_url: &str) -> Option<String> {
    let base = Url::parse(page_url).ok()?;
    let mut url = base.join(href.trim()).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

/// Stable key for a posting within its source
///
/// The posting URL identifies it when present; otherwise the lowercased
/// title, company, and location do.
pub fn dedupe_key(
    title: &str,
    company: Option<&str>,
    location: Option<&str>,
    url: Option<&str>,
) -> String {
    let material = match url {
        Some(url) => format!("url|{}", crate::url::frontier_key(url)),
        None => format!(
            "text|{}|{}|{}",
            title.to_lowercase(),
            company.unwrap_or("").to_lowercase(),
            location.unwrap_or("").to_lowercase()
        ),
    };

    let mut hasher = Sha256::new();
    hasher.update(material.as_bytes());
    hex::encode(hasher.finalize())
}
