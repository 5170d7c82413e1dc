//! CORE source implementation.
//!
//! Uses the CORE v3 API for searching open access research outputs.
//! API documentation: https://api.core.ac.uk/docs/v3
//!
//! Every request needs a free API key from https://core.ac.uk/register

use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde_json::Value;
use std::sync::Arc;

use crate::config::{Config, CoreConfig};
use crate::models::{PublicationRecord, SourceType};
use crate::normalize::normalize;
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::{expect_key, HttpClient};

const CORE_API_BASE: &str = "https://api.core.ac.uk/v3";

/// CORE source
#[derive(Debug, Clone)]
pub struct CoreSource {
    client: Arc<HttpClient>,
    base_url: String,
    api_key: Option<String>,
    options: CoreConfig,
}

impl CoreSource {
    pub fn from_config(client: Arc<HttpClient>, config: &Config) -> Self {
        Self {
            client,
            base_url: CORE_API_BASE.to_string(),
            api_key: config.api_keys.core.clone(),
            options: config.providers.core.clone(),
        }
    }

    /// Create against a different API base URL (for testing)
    pub fn with_base_url(
        client: Arc<HttpClient>,
        base_url: impl Into<String>,
        api_key: Option<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            options: CoreConfig::default(),
        }
    }

    pub fn with_options(mut self, options: CoreConfig) -> Self {
        self.options = options;
        self
    }

    fn build_search_url(&self, query: &str, limit: usize) -> String {
        let mut url = format!(
            "{}/search/works?q={}&limit={}",
            self.base_url,
            urlencoding::encode(query),
            limit
        );

        if let Some(filter) = &self.options.filter {
            url.push_str(&format!("&filter={}", urlencoding::encode(filter)));
        }
        if let Some(sort) = &self.options.sort {
            url.push_str(&format!("&sort={}", urlencoding::encode(sort)));
        }
        url
    }

    fn authorized(&self, url: &str) -> Result<RequestBuilder, SourceError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| SourceError::MissingApiKey("CORE_API_KEY".to_string()))?;
        Ok(self.client.get(url).bearer_auth(key))
    }

    async fn search_body(&self, query: &str, limit: usize) -> Result<Value, SourceError> {
        let request = self.authorized(&self.build_search_url(query, limit))?;
        self.client.json(request).await
    }
}

#[async_trait]
impl Source for CoreSource {
    fn source_type(&self) -> SourceType {
        SourceType::Core
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::PROBE | SourceCapabilities::REQUIRES_API_KEY
    }

    fn is_configured(&self) -> Result<(), SourceError> {
        match &self.api_key {
            Some(_) => Ok(()),
            None => Err(SourceError::MissingApiKey("CORE_API_KEY".to_string())),
        }
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<PublicationRecord>, SourceError> {
        let limit = limit.min(self.max_results());
        if limit == 0 {
            return Ok(Vec::new());
        }

        let body = self.search_body(query, limit).await?;
        expect_key(&body, "results")?;

        Ok(body["results"]
            .as_array()
            .map(|works| {
                works
                    .iter()
                    .take(limit)
                    .map(|work| normalize(work, SourceType::Core))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn probe(&self) -> Result<(), SourceError> {
        let body = self.search_body("cancer", 1).await?;
        expect_key(&body, "results")
    }
}
