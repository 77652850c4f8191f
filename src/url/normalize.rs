use crate::{UrlError, UrlResult};
use url::Url;

/// Query parameters that identify a visitor or campaign, never a page
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "ref", "source"];

/// File extensions that never lead to job content
const STATIC_ASSET_EXTENSIONS: &[&str] = &[
    "css", "js", "mjs", "map", "png", "jpg", "jpeg", "gif", "svg", "webp", "ico", "bmp", "woff",
    "woff2", "ttf", "otf", "eot", "mp4", "webm", "mp3", "wav", "zip", "gz", "tar", "rar", "exe",
    "dmg", "xml", "rss", "json", "txt", "csv", "pdf", "doc", "docx",
];

/// Canonicalizes an HTTP(S) URL for deduplication
///
/// The scheme is kept. The host is lowercased without `www.`. Empty path
/// segments and a trailing slash are dropped (dot segments are already
/// resolved by the parser). The fragment goes, tracking parameters go, and
/// what is left of the query is sorted by key, so `?page=2` stays distinct
/// from the bare listing.
///
/// # Examples
///
/// ```
/// use kite_harvest::url::normalize_url;
///
/// let url = normalize_url("https://WWW.EXAMPLE.COM/jobs/?utm_source=x#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/jobs");
/// ```
pub fn normalize_url(url_str: &str) -> UrlResult<Url> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .map(|h| h.to_lowercase())
        .ok_or(UrlError::MissingDomain)?;
    let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Malformed(format!("Failed to set host: {}", e)))?;

    let path = canonical_path(url.path());
    url.set_path(&path);
    url.set_fragment(None);

    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();

    if params.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut().clear().extend_pairs(&params);
    }

    Ok(url)
}

/// Computes the deduplication key used by the frontier and the visited set
///
/// Unparseable input falls back to its trimmed, lowercased form so that it
/// still deduplicates against itself.
pub fn frontier_key(url_str: &str) -> String {
    match normalize_url(url_str) {
        Ok(url) => url.to_string(),
        Err(_) => url_str.trim().trim_end_matches('/').to_lowercase(),
    }
}

/// Returns true if the URL path points at an obvious static asset
pub fn is_static_asset(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    let file = path.rsplit('/').next().unwrap_or("");

    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => STATIC_ASSET_EXTENSIONS.contains(&ext),
        _ => false,
    }
}

fn canonical_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
