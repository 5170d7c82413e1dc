//! Semantic Scholar source implementation using the Graph API.
//!
//! The public endpoint is shared by all anonymous clients and answers 429
//! often, so this is the one source with a retry policy.

use async_trait::async_trait;
use reqwest::RequestBuilder;
use std::sync::Arc;

use crate::config::Config;
use crate::models::{PublicationRecord, SourceType};
use crate::normalize::normalize;
use crate::sources::{Source, SourceCapabilities, SourceError, NO_ABSTRACT};
use crate::utils::{expect_key, HttpClient, RetryConfig};

const SEMANTIC_API_BASE: &str = "https://api.semanticscholar.org/graph/v1";

/// Fields requested for every search hit
const SEARCH_FIELDS: &str = "paperId,title,year,venue,abstract,externalIds,authors,url";

/// Semantic Scholar source
#[derive(Debug, Clone)]
pub struct SemanticScholarSource {
    client: Arc<HttpClient>,
    base_url: String,
    api_key: Option<String>,
    retry: RetryConfig,
}

impl SemanticScholarSource {
    pub fn from_config(client: Arc<HttpClient>, config: &Config) -> Self {
        Self {
            client,
            base_url: SEMANTIC_API_BASE.to_string(),
            api_key: config.api_keys.semantic_scholar.clone(),
            retry: config.retry.to_retry_config(),
        }
    }

    /// Create against a different API base URL (for testing)
    pub fn with_base_url(client: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            retry: RetryConfig::default(),
        }
    }

    /// API key (optional, for higher rate limits)
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    fn build_search_url(&self, query: &str, limit: usize) -> String {
        format!(
            "{}/paper/search?query={}&limit={}&fields={}",
            self.base_url,
            urlencoding::encode(query),
            limit,
            SEARCH_FIELDS
        )
    }

    fn build_paper_url(&self, id: &str) -> String {
        format!(
            "{}/paper/{}?fields=abstract",
            self.base_url,
            urlencoding::encode(id)
        )
    }

    /// Add API key to request headers if available
    fn add_api_key_if_present(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.header("x-api-key", key),
            None => builder,
        }
    }
}

#[async_trait]
impl Source for SemanticScholarSource {
    fn source_type(&self) -> SourceType {
        SourceType::SemanticScholar
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::ABSTRACT | SourceCapabilities::PROBE
    }

    fn retry_policy(&self) -> Option<RetryConfig> {
        Some(self.retry)
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<PublicationRecord>, SourceError> {
        let limit = limit.min(self.max_results());
        if limit == 0 {
            return Ok(Vec::new());
        }

        let request = self.add_api_key_if_present(self.client.get(&self.build_search_url(query, limit)));
        let body = self.client.json(request).await?;
        expect_key(&body, "data")?;

        Ok(body["data"]
            .as_array()
            .map(|papers| {
                papers
                    .iter()
                    .take(limit)
                    .map(|paper| normalize(paper, SourceType::SemanticScholar))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_abstract(&self, id: &str) -> Result<String, SourceError> {
        let request = self.add_api_key_if_present(self.client.get(&self.build_paper_url(id)));
        let paper = self.client.json(request).await?;
        let record = normalize(&paper, SourceType::SemanticScholar);

        if record.has_abstract() {
            Ok(record.abstract_text)
        } else {
            Ok(NO_ABSTRACT.to_string())
        }
    }

    async fn probe(&self) -> Result<(), SourceError> {
        let request = self.add_api_key_if_present(self.client.get(&self.build_search_url("cancer", 1)));
        let body = self.client.json(request).await?;
        expect_key(&body, "data")
    }
}
