//! OpenAlex source implementation.
//!
//! OpenAlex serves abstracts as an inverted index (word -> positions); the
//! normalizer rebuilds the text.

use async_trait::async_trait;
use std::sync::Arc;

use crate::config::Config;
use crate::models::{PublicationRecord, SourceType};
use crate::normalize::normalize;
use crate::sources::{Source, SourceCapabilities, SourceError, NO_ABSTRACT};
use crate::utils::{expect_key, HttpClient};

const OPENALEX_API_BASE: &str = "https://api.openalex.org";

/// OpenAlex source
#[derive(Debug, Clone)]
pub struct OpenAlexSource {
    client: Arc<HttpClient>,
    base_url: String,
    email: Option<String>,
}

impl OpenAlexSource {
    pub fn from_config(client: Arc<HttpClient>, config: &Config) -> Self {
        Self {
            client,
            base_url: OPENALEX_API_BASE.to_string(),
            email: config.contact_email.clone(),
        }
    }

    /// Create against a different API base URL (for testing)
    pub fn with_base_url(client: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            email: None,
        }
    }

    /// Send a contact address so requests join the polite pool
    pub fn with_email(mut self, email: Option<String>) -> Self {
        self.email = email;
        self
    }

    fn add_email_if_present(&self, url: String) -> String {
        match &self.email {
            Some(email) => format!("{}&mailto={}", url, urlencoding::encode(email)),
            None => url,
        }
    }

    fn build_search_url(&self, query: &str, limit: usize) -> String {
        self.add_email_if_present(format!(
            "{}/works?search={}&per-page={}",
            self.base_url,
            urlencoding::encode(query),
            limit
        ))
    }

    fn build_work_url(&self, id: &str) -> String {
        let id = id.trim_start_matches("https://openalex.org/");
        self.add_email_if_present(format!(
            "{}/works/{}?select=id,abstract_inverted_index",
            self.base_url,
            urlencoding::encode(id)
        ))
    }
}

#[async_trait]
impl Source for OpenAlexSource {
    fn source_type(&self) -> SourceType {
        SourceType::OpenAlex
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
        expect_key(&body, "results")?;

        Ok(body["results"]
            .as_array()
            .map(|works| {
                works
                    .iter()
                    .take(limit)
                    .map(|work| normalize(work, SourceType::OpenAlex))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn fetch_abstract(&self, id: &str) -> Result<String, SourceError> {
        let work = self.client.json(self.client.get(&self.build_work_url(id))).await?;
        let record = normalize(&work, SourceType::OpenAlex);

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
        expect_key(&body, "results")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> OpenAlexSource {
        OpenAlexSource::with_base_url(Arc::new(HttpClient::new().unwrap()), "http://localhost")
    }

    #[test]
    fn test_build_search_url() {
        let url = source().build_search_url("graph neural networks", 25);
        assert_eq!(
            url,
            "http://localhost/works?search=graph%20neural%20networks&per-page=25"
        );
    }

    #[test]
    fn test_mailto_added() {
        let source = source().with_email(Some("lab@example.org".to_string()));
        assert!(source
            .build_search_url("x", 1)
            .ends_with("&mailto=lab%40example.org"));
    }

    #[test]
    fn test_work_url_accepts_full_id() {
        let url = source().build_work_url("https://openalex.org/W2741809807");
        assert!(url.starts_with("http://localhost/works/W2741809807?"));
    }
}
