//! Europe PMC source implementation using their REST API.
//!
//! Europe PMC indexes PubMed, PMC, and preprints from bioRxiv/medRxiv.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::models::{PublicationRecord, SourceType};
use crate::normalize::normalize;
use crate::sources::{Source, SourceCapabilities, SourceError, NO_ABSTRACT};
use crate::utils::{expect_key, HttpClient};

/// Europe PMC REST API base URL
const EUROPE_PMC_BASE_URL: &str = "https://www.ebi.ac.uk/europepmc/webservices/rest";

/// Europe PMC source
#[derive(Debug, Clone)]
pub struct EuropePmcSource {
    client: Arc<HttpClient>,
    base_url: String,
}

impl EuropePmcSource {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self::with_base_url(client, EUROPE_PMC_BASE_URL)
    }

    /// Create against a different REST base URL (for testing)
    pub fn with_base_url(client: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build search URL
    fn build_search_url(&self, query: &str, page_size: usize) -> String {
        format!(
            "{}/search?query={}&format=json&pageSize={}&resultType=core",
            self.base_url,
            urlencoding::encode(query),
            page_size
        )
    }

    /// Result entries of a search response
    fn results(body: &Value) -> Result<&[Value], SourceError> {
        expect_key(body, "resultList")?;
        Ok(body["resultList"]["result"]
            .as_array()
            .map(Vec::as_slice)
            .unwrap_or_default())
    }
}

#[async_trait]
impl Source for EuropePmcSource {
    fn source_type(&self) -> SourceType {
        SourceType::EuropePmc
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::ABSTRACT | SourceCapabilities::PROBE
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<PublicationRecord>, SourceError> {
        let limit = limit.min(self.max_results());
        if limit == 0 {
            return Ok(Vec::new());
        }

        let url = self.build_search_url(query, limit);
        let body = self.client.json(self.client.get(&url)).await?;

        Ok(Self::results(&body)?
            .iter()
            .take(limit)
            .map(|result| normalize(result, SourceType::EuropePmc))
            .collect())
    }

    async fn fetch_abstract(&self, id: &str) -> Result<String, SourceError> {
        let url = self.build_search_url(&format!("EXT_ID:{}", id), 1);
        let body = self.client.json(self.client.get(&url)).await?;

        let result = Self::results(&body)?
            .first()
            .ok_or_else(|| SourceError::NotFound(format!("Europe PMC record {}", id)))?;

        let record = normalize(result, SourceType::EuropePmc);
        if record.has_abstract() {
            Ok(record.abstract_text)
        } else {
            Ok(NO_ABSTRACT.to_string())
        }
    }

    async fn probe(&self) -> Result<(), SourceError> {
        let body = self
            .client
            .json(self.client.get(&self.build_search_url("cancer", 1)))
            .await?;
        expect_key(&body, "resultList")
    }
}
