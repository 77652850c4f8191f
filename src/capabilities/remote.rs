//! HTTP implementations of URL resolution and source validation

use super::{CapabilityResult, Resolution, SourceValidator, UrlResolver, Validation};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// Paths where job boards commonly live
const CAREER_PATHS: &[&str] = &["/careers", "/jobs", "/careers/jobs", "/about/careers", "/join-us"];

const CHECK_TIMEOUT: Duration = Duration::from_secs(15);

/// Checks that a source URL answers with a success status
#[derive(Debug, Clone)]
pub struct HttpSourceValidator {
    client: Client,
}

impl HttpSourceValidator {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceValidator for HttpSourceValidator {
    async fn validate(&self, source_id: i64, url: &str) -> CapabilityResult<Validation> {
        tracing::debug!(source_id, url, "Validating source URL");

        match self.client.get(url).timeout(CHECK_TIMEOUT).send().await {
            Ok(response) => {
                let status = response.status();
                Ok(Validation {
                    is_valid: status.is_success(),
                    status_code: Some(status.as_u16()),
                    error_message: (!status.is_success()).then(|| format!("HTTP {}", status)),
                })
            }
            Err(e) => Ok(Validation {
                is_valid: false,
                status_code: None,
                error_message: Some(e.to_string()),
            }),
        }
    }
}

/// Finds a working replacement for a broken start URL by probing nearby paths
///
/// Candidates are tried in order: each parent path of the broken URL, the
/// usual careers paths on the same host, then the site root.
#[derive(Debug, Clone)]
pub struct HttpUrlResolver {
    client: Client,
    max_candidates: usize,
}

impl HttpUrlResolver {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_candidates: 8,
        }
    }

    pub fn with_max_candidates(mut self, max_candidates: usize) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    async fn check_candidate(&self, url: &str) -> Option<String> {
        let response = self
            .client
            .get(url)
            .timeout(CHECK_TIMEOUT)
            .send()
            .await
            .ok()?;
        response
            .status()
            .is_success()
            .then(|| response.url().to_string())
    }
}

/// Builds the ordered candidate list for a broken URL
fn candidates(broken: &Url) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |url: Url| {
        let s = url.to_string();
        if s != broken.as_str() && !out.contains(&s) {
            out.push(s);
        }
    };

    let mut base = broken.clone();
    base.set_query(None);
    base.set_fragment(None);

    // Parent paths, nearest first
    let segments: Vec<String> = broken
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).map(String::from).collect())
        .unwrap_or_default();
    for keep in (1..segments.len()).rev() {
        let mut parent = base.clone();
        parent.set_path(&format!("/{}", segments[..keep].join("/")));
        push(parent);
    }

    for path in CAREER_PATHS {
        let mut candidate = base.clone();
        candidate.set_path(path);
        push(candidate);
    }

    let mut root = base;
    root.set_path("/");
    push(root);

    out
}

#[async_trait]
impl UrlResolver for HttpUrlResolver {
    async fn resolve(
        &self,
        broken_url: &str,
        source_name: &str,
        attempts_so_far: u32,
    ) -> CapabilityResult<Resolution> {
        let Ok(broken) = Url::parse(broken_url) else {
            return Ok(Resolution {
                corrected_url: None,
                method: "unparseable".to_string(),
                attempts_made: 0,
            });
        };

        // Later attempts skip the candidates earlier attempts already tried
        let skip = attempts_so_far as usize * self.max_candidates;
        let mut attempts_made = 0;

        for candidate in candidates(&broken).into_iter().skip(skip).take(self.max_candidates) {
            attempts_made += 1;
            tracing::debug!(source = source_name, candidate, "Probing replacement URL");
            if let Some(working) = self.check_candidate(&candidate).await {
                if working != broken_url {
                    return Ok(Resolution {
                        corrected_url: Some(working),
                        method: "path-search".to_string(),
                        attempts_made,
                    });
                }
            }
        }

        Ok(Resolution {
            corrected_url: None,
            method: "path-search".to_string(),
            attempts_made,
        })
    }
}
