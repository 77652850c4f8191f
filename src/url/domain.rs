use url::Url;

/// Extracts the lowercase host from a URL, without a leading `www.`
///
/// # Examples
///
/// ```
/// use url::Url;
/// use kite_harvest::url::extract_domain;
///
/// let url = Url::parse("https://WWW.Example.com/jobs").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| {
        let host = h.to_lowercase();
        match host.strip_prefix("www.") {
            Some(bare) => bare.to_string(),
            None => host,
        }
    })
}

/// Checks if a host matches a domain pattern
///
/// `"example.com"` matches only that host; `"*.example.com"` matches the bare
/// domain and any subdomain of it.
pub fn domain_matches(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_lowercase();
    let host = host.to_lowercase();

    if let Some(base) = pattern.strip_prefix("*.") {
        host == base || host.ends_with(&format!(".{}", base))
    } else {
        host == pattern
    }
}

/// Returns true if the candidate belongs to the same site as the source domain
///
/// Subdomains of the source domain count as the same site, so a crawl rooted
/// at `example.com` follows links into `jobs.example.com`.
pub fn is_same_site(source_domain: &str, candidate: &Url) -> bool {
    match extract_domain(candidate) {
        Some(host) => domain_matches(&format!("*.{}", source_domain), &host),
        None => false,
    }
}
