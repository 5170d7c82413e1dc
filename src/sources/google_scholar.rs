//! Google Scholar source implementation.
//!
//! NOTE: This source is DISABLED by default. Enable it with
//! `GOOGLE_SCHOLAR_ENABLED=true` or `[providers.google_scholar] enabled = true`.
//!
//! Google Scholar does not have an official public API. Results are scraped
//! from the HTML result page, which changes without notice and may be
//! blocked by CAPTCHAs. Use at your own risk.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::config::Config;
use crate::models::{PublicationRecord, SourceType};
use crate::normalize::normalize;
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::HttpClient;

const GOOGLE_SCHOLAR_URL: &str = "https://scholar.google.com";

/// Environment variable to enable Google Scholar scraping
const GOOGLE_SCHOLAR_ENABLED_VAR: &str = "GOOGLE_SCHOLAR_ENABLED";

/// Scholar serves at most 20 hits per page
const MAX_RESULTS: usize = 20;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko)";

/// Google Scholar source
#[derive(Debug, Clone)]
pub struct GoogleScholarSource {
    client: Arc<HttpClient>,
    base_url: String,
    enabled: bool,
}

impl GoogleScholarSource {
    pub fn from_config(client: Arc<HttpClient>, config: &Config) -> Self {
        let enabled = config.providers.google_scholar.enabled;
        if !enabled {
            tracing::debug!(
                "Google Scholar source is disabled. Set {}=true to enable.",
                GOOGLE_SCHOLAR_ENABLED_VAR
            );
        }

        Self {
            client,
            base_url: GOOGLE_SCHOLAR_URL.to_string(),
            enabled,
        }
    }

    /// Create an enabled source against a different host (for testing)
    pub fn with_base_url(client: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            enabled: true,
        }
    }

    fn build_search_url(&self, query: &str, limit: usize) -> String {
        format!(
            "{}/scholar?hl=en&q={}&num={}",
            self.base_url,
            urlencoding::encode(query),
            limit
        )
    }

    async fn fetch_page(&self, query: &str, limit: usize) -> Result<String, SourceError> {
        self.is_configured()?;
        let request = self
            .client
            .get(&self.build_search_url(query, limit))
            .header("User-Agent", BROWSER_USER_AGENT);
        self.client.text(request).await
    }

    /// Reshape each result block of a result page into a JSON object
    fn parse_results(html: &str, limit: usize) -> Result<Vec<Value>, SourceError> {
        let document = Html::parse_document(html);

        let result_sel = selector(".gs_r.gs_or.gs_scl")?;
        let title_sel = selector(".gs_rt")?;
        let link_sel = selector(".gs_rt a")?;
        let meta_sel = selector(".gs_a")?;
        let snippet_sel = selector(".gs_rs")?;

        let results = document
            .select(&result_sel)
            .take(limit)
            .map(|element| {
                let title = first_text(element, &title_sel).map(|t| strip_title_tags(&t));
                let link = element
                    .select(&link_sel)
                    .next()
                    .and_then(|e| e.value().attr("href"))
                    .map(str::to_string);
                let byline = first_text(element, &meta_sel);
                let (authors, venue) = byline.as_deref().map(split_byline).unwrap_or_default();

                json!({
                    "cluster_id": element.value().attr("data-cid"),
                    "title": title,
                    "link": link,
                    "byline": byline,
                    "authors": authors,
                    "venue": venue,
                    "snippet": first_text(element, &snippet_sel),
                })
            })
            .collect();

        Ok(results)
    }

    /// Whether the page holds a result list (possibly empty)
    fn has_results_container(html: &str) -> Result<bool, SourceError> {
        let document = Html::parse_document(html);
        let container = selector("#gs_res_ccl, #gs_res_ccl_mid")?;
        Ok(document.select(&container).next().is_some())
    }
}

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Parse(format!("Invalid selector '{}': {}", css, e)))
}

fn first_text(element: ElementRef<'_>, sel: &Selector) -> Option<String> {
    element
        .select(sel)
        .next()
        .map(|e| e.text().collect::<String>())
        .filter(|text| !text.trim().is_empty())
}

/// Drop the "[PDF]" / "[HTML]" / "[CITATION]" markers Scholar puts before titles
fn strip_title_tags(title: &str) -> String {
    let mut rest = title.trim();
    while let Some(stripped) = rest.strip_prefix('[') {
        match stripped.find(']') {
            Some(end) => rest = stripped[end + 1..].trim_start(),
            None => break,
        }
    }
    rest.to_string()
}

/// Split a byline like "A Smith, B Jones - Nature, 2020 - nature.com" into
/// authors and venue
fn split_byline(byline: &str) -> (Option<String>, Option<String>) {
    let mut parts = byline.split(" - ").map(str::trim);

    let authors = parts
        .next()
        .filter(|a| !a.is_empty())
        .map(|a| a.trim_end_matches('…').trim().replace(", ", "; "));

    let venue = parts.next().and_then(|venue_year| {
        let venue: Vec<&str> = venue_year
            .split(',')
            .map(str::trim)
            .filter(|s| !(s.len() == 4 && s.chars().all(|c| c.is_ascii_digit())))
            .filter(|s| !s.is_empty())
            .collect();
        if venue.is_empty() {
            None
        } else {
            Some(venue.join(", "))
        }
    });

    (authors, venue)
}

#[async_trait]
impl Source for GoogleScholarSource {
    fn source_type(&self) -> SourceType {
        SourceType::GoogleScholar
    }

    fn max_results(&self) -> usize {
        MAX_RESULTS
    }

    fn is_configured(&self) -> Result<(), SourceError> {
        if self.enabled {
            Ok(())
        } else {
            Err(SourceError::Disabled(format!(
                "set {}=true to enable",
                GOOGLE_SCHOLAR_ENABLED_VAR
            )))
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<PublicationRecord>, SourceError> {
        let limit = limit.min(self.max_results());
        if limit == 0 {
            return Ok(Vec::new());
        }

        let html = self.fetch_page(query, limit).await?;
        let results = Self::parse_results(&html, limit)?;
        if results.is_empty() && !Self::has_results_container(&html)? {
            return Err(SourceError::Parse(
                "Google Scholar page has no result list (possibly a CAPTCHA)".to_string(),
            ));
        }

        Ok(results
            .iter()
            .map(|result| normalize(result, SourceType::GoogleScholar))
            .collect())
    }

    async fn probe(&self) -> Result<(), SourceError> {
        let html = self.fetch_page("cancer", 1).await?;
        if Self::has_results_container(&html)? {
            Ok(())
        } else {
            Err(SourceError::Parse("no result container in page".to_string()))
        }
    }
}
