//! PubMed source implementation using the NCBI E-utilities API.
//!
//! A search is two requests: `esearch` returns the matching PMIDs, then one
//! batched `esummary` returns a document per PMID. Abstracts are not part of
//! the summary and are fetched on demand through `efetch`.

use async_trait::async_trait;
use nonzero_ext::nonzero;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;
use std::sync::Arc;

use crate::config::Config;
use crate::models::{PublicationRecord, SourceType};
use crate::normalize::normalize;
use crate::sources::{Source, SourceCapabilities, SourceError, NO_ABSTRACT};
use crate::utils::{expect_key, HttpClient};

/// E-utilities base URL
const EUTILS_BASE_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";

/// PubMed source
#[derive(Debug, Clone)]
pub struct PubMedSource {
    client: Arc<HttpClient>,
    base_url: String,
    api_key: Option<String>,
    email: Option<String>,
}

impl PubMedSource {
    /// Create a source sharing `client`, paced to NCBI's published limits
    /// (3 requests/s, or 10 with an API key)
    pub fn from_config(client: &HttpClient, config: &Config) -> Self {
        let api_key = config.api_keys.ncbi.clone();
        let per_second = if api_key.is_some() {
            nonzero!(10u32)
        } else {
            nonzero!(3u32)
        };

        Self {
            client: Arc::new(client.clone().rate_limited(per_second)),
            base_url: EUTILS_BASE_URL.to_string(),
            api_key,
            email: config.contact_email.clone(),
        }
    }

    /// Create against a different E-utilities base URL (for testing)
    pub fn with_base_url(client: Arc<HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
            email: None,
        }
    }

    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key;
        self
    }

    /// Parameters NCBI asks every client to send
    fn common_params(&self) -> String {
        let mut params = String::new();
        if let Some(key) = &self.api_key {
            params.push_str(&format!("&api_key={}", urlencoding::encode(key)));
        }
        if let Some(email) = &self.email {
            params.push_str(&format!("&email={}", urlencoding::encode(email)));
        }
        params
    }

    /// Build the esearch URL
    fn build_search_url(&self, query: &str, limit: usize) -> String {
        format!(
            "{}/esearch.fcgi?db=pubmed&term={}&retmode=json&retmax={}{}",
            self.base_url,
            urlencoding::encode(query),
            limit,
            self.common_params()
        )
    }

    /// Build one batched esummary URL for the given PMIDs
    fn build_summary_url(&self, ids: &[String]) -> String {
        format!(
            "{}/esummary.fcgi?db=pubmed&id={}&retmode=json{}",
            self.base_url,
            ids.join(","),
            self.common_params()
        )
    }

    fn build_fetch_url(&self, id: &str) -> String {
        format!(
            "{}/efetch.fcgi?db=pubmed&id={}&retmode=xml{}",
            self.base_url,
            urlencoding::encode(id),
            self.common_params()
        )
    }

    /// PMIDs from an esearch response, in relevance order
    fn parse_id_list(body: &Value) -> Result<Vec<String>, SourceError> {
        expect_key(body, "esearchresult")?;

        let ids = body["esearchresult"]["idlist"]
            .as_array()
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| id.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();

        Ok(ids)
    }

    /// Records from an esummary response, ordered as `ids`
    fn parse_summaries(body: &Value, ids: &[String]) -> Result<Vec<PublicationRecord>, SourceError> {
        expect_key(body, "result")?;
        let result = &body["result"];

        let records = ids
            .iter()
            .filter_map(|id| {
                let doc = result.get(id.as_str())?;
                if !doc.is_object() || doc.get("error").is_some() {
                    tracing::debug!("PubMed summary missing for PMID {}", id);
                    return None;
                }
                Some(normalize(doc, SourceType::PubMed))
            })
            .collect();

        Ok(records)
    }

    /// Abstract text from an efetch document, `None` if the article has none.
    ///
    /// `AbstractText` sections may carry inline markup (`<i>`, `<sup>`, ...);
    /// only their text is kept. Sections are joined with a space.
    fn parse_abstract(xml: &str, id: &str) -> Result<Option<String>, SourceError> {
        let mut reader = Reader::from_str(xml);

        let mut found_article = false;
        let mut in_abstract = false;
        let mut section: Option<String> = None;
        let mut sections: Vec<String> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => match e.local_name().as_ref() {
                    b"PubmedArticle" => found_article = true,
                    b"Abstract" if found_article => in_abstract = true,
                    b"AbstractText" if in_abstract => section = Some(String::new()),
                    _ => {}
                },
                Event::Text(text) => {
                    if let Some(section) = section.as_mut() {
                        let text = text
                            .unescape()
                            .map_err(|e| SourceError::Parse(format!("XML: {}", e)))?;
                        section.push_str(&text);
                    }
                }
                Event::CData(data) => {
                    if let Some(section) = section.as_mut() {
                        section.push_str(&String::from_utf8_lossy(&data));
                    }
                }
                Event::End(e) => match e.local_name().as_ref() {
                    b"AbstractText" => {
                        if let Some(text) = section.take() {
                            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
                            if !text.is_empty() {
                                sections.push(text);
                            }
                        }
                    }
                    b"Abstract" => in_abstract = false,
                    // Only the first article is read
                    b"PubmedArticle" => break,
                    _ => {}
                },
                Event::Eof => break,
                _ => {}
            }
        }

        if !found_article {
            return Err(SourceError::NotFound(format!("PMID {}", id)));
        }

        Ok(Some(sections.join(" ")).filter(|text| !text.is_empty()))
    }
}

#[async_trait]
impl Source for PubMedSource {
    fn source_type(&self) -> SourceType {
        SourceType::PubMed
    }

    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::ABSTRACT | SourceCapabilities::PROBE
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<PublicationRecord>, SourceError> {
        let limit = limit.min(self.max_results());
        if limit == 0 {
            return Ok(Vec::new());
        }

        let search_url = self.build_search_url(query, limit);
        let body = self.client.json(self.client.get(&search_url)).await?;
        let mut ids = Self::parse_id_list(&body)?;
        ids.truncate(limit);

        tracing::debug!("PubMed esearch returned {} ids", ids.len());
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let summary_url = self.build_summary_url(&ids);
        let summaries = self.client.json(self.client.get(&summary_url)).await?;
        Self::parse_summaries(&summaries, &ids)
    }

    async fn fetch_abstract(&self, id: &str) -> Result<String, SourceError> {
        let xml = self.client.text(self.client.get(&self.build_fetch_url(id))).await?;
        let text = Self::parse_abstract(&xml, id)?;
        Ok(text.unwrap_or_else(|| NO_ABSTRACT.to_string()))
    }

    async fn probe(&self) -> Result<(), SourceError> {
        let body = self
            .client
            .json(self.client.get(&self.build_search_url("cancer", 1)))
            .await?;
        expect_key(&body, "esearchresult")
    }
}
