//! Default content capabilities: cleaning, posting extraction, classification
//!
//! All three work on static HTML with `scraper`. Parsing is done in plain
//! synchronous helpers because `scraper::Html` is not `Send`.

use super::{
    CapabilityResult, Classification, Classifier, CleanedContent, Cleaner, ExtractHints,
    Extraction, Extractor,
};
use crate::jobs::RawListing;
use crate::model::PageType;
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use url::Url;

/// Elements that never carry posting content
const STRIP_SELECTOR: &str = "script, style, noscript, svg, iframe, template, link[rel=stylesheet]";

const JSON_LD_TYPE: &str = "application/ld+json";

/// Path fragments that mark a link as pointing at postings
const JOB_PATH_MARKERS: &[&str] = &[
    "/job/",
    "/jobs/",
    "/careers/",
    "/position",
    "/vacanc",
    "/opening",
    "/requisition",
];

/// Markup fragments left by common bot challenges
const CAPTCHA_MARKERS: &[&str] = &[
    "g-recaptcha",
    "h-captcha",
    "hcaptcha.com",
    "cf-challenge",
    "challenge-platform",
    "id=\"captcha",
];

/// Returns true if the href looks like a link to a posting or posting list
pub(crate) fn is_job_href(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    JOB_PATH_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Selects all matches of `css`; an unparsable selector matches nothing
fn select_all<'a>(document: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match Selector::parse(css) {
        Ok(selector) => document.select(&selector).collect(),
        Err(_) => Vec::new(),
    }
}

fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<Vec<_>>().join(" ")
}

// ===== Cleaning =====

/// Strips scripts, styles, and embedded frames, keeping JSON-LD blocks
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlCleaner;

fn clean_html(raw_html: &str) -> CleanedContent {
    let mut document = Html::parse_document(raw_html);

    let doomed: Vec<_> = select_all(&document, STRIP_SELECTOR)
        .into_iter()
        .filter(|el| el.value().attr("type") != Some(JSON_LD_TYPE))
        .map(|el| el.id())
        .collect();

    let mut elements_removed = 0;
    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
            elements_removed += 1;
        }
    }

    let cleaned_html = document.html();
    CleanedContent {
        original_size: raw_html.len(),
        cleaned_size: cleaned_html.len(),
        cleaned_html,
        elements_removed,
    }
}

#[async_trait]
impl Cleaner for HtmlCleaner {
    async fn clean(&self, raw_html: &str, _base_url: &str) -> CapabilityResult<CleanedContent> {
        Ok(clean_html(raw_html))
    }
}

// ===== Extraction =====

/// Extracts postings from JSON-LD `JobPosting` blocks, falling back to job links
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredExtractor;

fn extract_listings(html: &str, page_url: &str) -> Extraction {
    let document = Html::parse_document(html);

    let listings = json_ld_postings(&document);
    if !listings.is_empty() {
        return Extraction {
            listings,
            strategy: "json-ld".to_string(),
        };
    }

    Extraction {
        listings: anchor_postings(&document, page_url),
        strategy: "anchor-heuristic".to_string(),
    }
}

fn json_ld_postings(document: &Html) -> Vec<RawListing> {
    let mut postings = Vec::new();

    for script in select_all(document, "script[type=\"application/ld+json\"]") {
        let text = script.text().collect::<String>();
        let Ok(value) = serde_json::from_str::<Value>(text.trim()) else {
            continue;
        };
        collect_postings(&value, &mut postings);
    }

    postings
}

fn collect_postings(value: &Value, out: &mut Vec<RawListing>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| collect_postings(item, out)),
        Value::Object(map) => {
            if let Some(graph) = map.get("@graph") {
                collect_postings(graph, out);
            }
            if let Some(items) = map.get("itemListElement") {
                collect_postings(items, out);
            }
            if let Some(item) = map.get("item") {
                collect_postings(item, out);
            }
            if is_job_posting(value) {
                out.push(posting_from_json(value));
            }
        }
        _ => {}
    }
}

fn is_job_posting(value: &Value) -> bool {
    match value.get("@type") {
        Some(Value::String(t)) => t == "JobPosting",
        Some(Value::Array(types)) => types.iter().any(|t| t.as_str() == Some("JobPosting")),
        _ => false,
    }
}

/// Reads a field that is either a plain string or an object with `name`
fn name_or_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map.get("name").and_then(Value::as_str).map(String::from),
        Value::Array(items) => name_or_string(items.first()),
        _ => None,
    }
}

fn location_from_json(value: Option<&Value>) -> Option<String> {
    let value = match value? {
        Value::Array(items) => items.first()?,
        other => other,
    };
    if let Some(s) = value.as_str() {
        return Some(s.to_string());
    }

    let address = value.get("address")?;
    if let Some(s) = address.as_str() {
        return Some(s.to_string());
    }

    let parts: Vec<&str> = ["addressLocality", "addressRegion", "addressCountry"]
        .iter()
        .filter_map(|key| match address.get(*key) {
            Some(Value::String(s)) => Some(s.as_str()),
            Some(other) => other.get("name").and_then(Value::as_str),
            None => None,
        })
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(", "))
    }
}

fn salary_from_json(value: Option<&Value>) -> Option<String> {
    let salary = value?;
    if let Some(s) = salary.as_str() {
        return Some(s.to_string());
    }

    let currency = salary.get("currency").and_then(Value::as_str).unwrap_or("");
    let amount = salary.get("value")?;
    let amount = match amount {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Object(range) => {
            let min = range.get("minValue").map(Value::to_string);
            let max = range.get("maxValue").map(Value::to_string);
            match (min, max) {
                (Some(min), Some(max)) => format!("{}-{}", min, max),
                (Some(v), None) | (None, Some(v)) => v,
                (None, None) => range.get("value").map(Value::to_string)?,
            }
        }
        _ => return None,
    };

    Some(format!("{} {}", amount, currency).trim().to_string())
}

fn posting_from_json(value: &Value) -> RawListing {
    let text = |key: &str| value.get(key).and_then(Value::as_str).map(String::from);

    RawListing {
        title: text("title").or_else(|| text("name")),
        company: name_or_string(value.get("hiringOrganization")),
        location: location_from_json(value.get("jobLocation")),
        url: text("url"),
        description: text("description"),
        salary: salary_from_json(value.get("baseSalary")),
        posted_at: text("datePosted"),
    }
}

fn anchor_postings(document: &Html, page_url: &str) -> Vec<RawListing> {
    let base = Url::parse(page_url).ok();
    let mut seen = HashSet::new();
    let mut postings = Vec::new();

    for anchor in select_all(document, "a[href]") {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !is_job_href(href) {
            continue;
        }

        let title = element_text(&anchor)
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        // Navigation links like "Jobs" or "See all" are not postings
        if title.split(' ').count() < 2 {
            continue;
        }

        let absolute = base
            .as_ref()
            .and_then(|b| b.join(href).ok())
            .map(|u| u.to_string())
            .unwrap_or_else(|| href.to_string());
        if !seen.insert(absolute.clone()) {
            continue;
        }

        postings.push(RawListing {
            title: Some(title),
            url: Some(absolute),
            ..Default::default()
        });
    }

    postings
}

#[async_trait]
impl Extractor for StructuredExtractor {
    async fn extract(
        &self,
        html: &str,
        url: &str,
        hints: &ExtractHints,
    ) -> CapabilityResult<Extraction> {
        let mut extraction = extract_listings(html, url);
        if hints.raw_content {
            extraction.strategy = format!("{}+raw", extraction.strategy);
        }
        Ok(extraction)
    }
}

// ===== Classification =====

/// Rule-based page classifier
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

fn classify_html(html: &str, url: &str) -> Classification {
    let heuristic = |page_type, confidence| Classification {
        page_type,
        confidence,
        method: "heuristic".to_string(),
    };

    let lower = html.to_ascii_lowercase();
    if CAPTCHA_MARKERS.iter().any(|marker| lower.contains(marker)) {
        return heuristic(PageType::Captcha, 0.9);
    }

    let document = Html::parse_document(html);
    let job_links = select_all(&document, "a[href]")
        .into_iter()
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| is_job_href(href))
        .count();
    let postings = json_ld_postings(&document).len();
    let has_password = !select_all(&document, "input[type=password]").is_empty();

    if has_password && job_links < 3 {
        return heuristic(PageType::LoginWall, 0.8);
    }
    if postings >= 2 || job_links >= 3 {
        return heuristic(PageType::JobList, 0.7);
    }
    if postings == 1 || (is_job_href(url) && lower.contains("apply")) {
        return heuristic(PageType::JobDetail, 0.6);
    }

    let heading = select_all(&document, "title, h1")
        .iter()
        .map(|el| element_text(el).to_lowercase())
        .collect::<Vec<_>>()
        .join(" ");
    if heading.contains("career") || heading.contains("join us") || heading.contains("jobs") {
        return heuristic(PageType::CareersLanding, 0.5);
    }

    heuristic(PageType::Irrelevant, 0.4)
}

#[async_trait]
impl Classifier for HeuristicClassifier {
    async fn classify(&self, html: &str, url: &str) -> CapabilityResult<Classification> {
        Ok(classify_html(html, url))
    }
}
