//! HTTP-backed browser capability
//!
//! A minimal `Browser` for static job boards: navigation is a GET request and
//! the "rendered" content is the response body. Pages that need scripting to
//! show postings require a real browser automation backend behind the same
//! trait.

use super::{Browser, BrowserSession, CapabilityError, CapabilityResult, Visibility};
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client};
use scraper::{Html, Selector};
use std::time::Duration;

/// Builds the shared HTTP client
///
/// # Example
///
/// ```no_run
/// use kite_harvest::capabilities::build_http_client;
///
/// let client = build_http_client("kite-harvest/1.0").unwrap();
/// ```
pub fn build_http_client(user_agent: &str) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(60))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Opens sessions that fetch pages over plain HTTP
#[derive(Debug, Clone)]
pub struct HttpBrowser {
    client: Client,
}

impl HttpBrowser {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    async fn open(&self, visibility: Visibility) -> CapabilityResult<Box<dyn BrowserSession>> {
        tracing::debug!(?visibility, "Opening HTTP session");
        Ok(Box::new(HttpSession {
            client: self.client.clone(),
            current_url: None,
            body: None,
            closed: false,
        }))
    }
}

struct HttpSession {
    client: Client,
    current_url: Option<String>,
    body: Option<String>,
    closed: bool,
}

impl HttpSession {
    fn ensure_open(&self) -> CapabilityResult<()> {
        if self.closed {
            return Err(CapabilityError::Session("session is closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BrowserSession for HttpSession {
    async fn navigate(&mut self, url: &str, timeout: Duration) -> CapabilityResult<()> {
        self.ensure_open()?;
        self.body = None;

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CapabilityError::Timeout {
                        operation: format!("navigation to {}", url),
                        millis: timeout.as_millis() as u64,
                    }
                } else {
                    CapabilityError::Navigation {
                        url: url.to_string(),
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(CapabilityError::Navigation {
                url: url.to_string(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        self.current_url = Some(response.url().to_string());
        self.body = Some(response.text().await?);
        Ok(())
    }

    async fn wait_for_selector(
        &mut self,
        selector: &str,
        _timeout: Duration,
    ) -> CapabilityResult<bool> {
        self.ensure_open()?;
        let selector = Selector::parse(selector)
            .map_err(|e| CapabilityError::Session(format!("invalid selector: {:?}", e)))?;

        // A static response never changes, so the check is immediate
        Ok(self
            .body
            .as_deref()
            .map(|body| Html::parse_document(body).select(&selector).next().is_some())
            .unwrap_or(false))
    }

    async fn read_rendered_content(&mut self) -> CapabilityResult<String> {
        self.ensure_open()?;
        self.body.clone().ok_or_else(|| {
            CapabilityError::Session(match &self.current_url {
                Some(url) => format!("no content loaded for {}", url),
                None => "no page loaded".to_string(),
            })
        })
    }

    async fn close(&mut self) -> CapabilityResult<()> {
        self.closed = true;
        self.body = None;
        Ok(())
    }
}
