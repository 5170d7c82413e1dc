//! Provider clients with a shared trait-based architecture.
//!
//! This module defines the [`Source`] trait implemented by every literature
//! provider. Each implementation performs the provider's HTTP calls and hands
//! the raw payload to [`crate::normalize::normalize`], so every client returns
//! canonical [`PublicationRecord`]s.
//!
//! # Providers
//!
//! | id               | provider          | needs                         |
//! |------------------|-------------------|-------------------------------|
//! | `pubmed`         | PubMed            | optional `NCBI_API_KEY`       |
//! | `europe_pmc`     | Europe PMC        |                               |
//! | `core`           | CORE              | `CORE_API_KEY`                |
//! | `openalex`       | OpenAlex          | optional contact email        |
//! | `google_scholar` | Google Scholar    | `GOOGLE_SCHOLAR_ENABLED=true` |
//! | `semantic`       | Semantic Scholar  | optional API key, rate-limits |
//!
//! Google Scholar has no official API; results are scraped from HTML on a
//! best-effort basis and the source is disabled unless explicitly enabled.

mod core;
mod europe_pmc;
mod google_scholar;
mod openalex;
mod probe;
mod pubmed;
mod registry;
mod semantic;

pub mod mock;

pub use self::core::CoreSource;
pub use europe_pmc::EuropePmcSource;
pub use google_scholar::GoogleScholarSource;
pub use mock::MockSource;
pub use openalex::OpenAlexSource;
pub use probe::{ConnectionProbe, DEFAULT_PROBE_TIMEOUT, MAX_PROBE_TIMEOUT};
pub use pubmed::PubMedSource;
pub use registry::{SourceCapabilities, SourceRegistry};
pub use semantic::SemanticScholarSource;

use async_trait::async_trait;

use crate::models::{FailureKind, PublicationRecord, SourceType};
use crate::utils::RetryConfig;

/// Placeholder returned by [`Source::fetch_abstract`] when a record has no abstract
pub const NO_ABSTRACT: &str = "(No abstract available)";

/// Default upper bound on records requested from one provider
pub const DEFAULT_MAX_RESULTS: usize = 100;

/// The Source trait defines the interface for every provider client.
///
/// # Implementing a New Source
///
/// 1. Add a [`SourceType`] variant and a [`crate::normalize::FieldMapping`] for it
/// 2. Implement `source_type`, `search` and `probe`
/// 3. Override `fetch_abstract`, `is_configured` or `retry_policy` when they apply
/// 4. Register the source in [`SourceRegistry::from_config`]
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Which provider this client talks to
    fn source_type(&self) -> SourceType;

    /// Stable identifier ("pubmed", "core", ...)
    fn id(&self) -> &'static str {
        self.source_type().id()
    }

    /// Human-readable name
    fn name(&self) -> &'static str {
        self.source_type().name()
    }

    /// Describe the capabilities of this source
    fn capabilities(&self) -> SourceCapabilities {
        SourceCapabilities::SEARCH | SourceCapabilities::PROBE
    }

    /// Largest number of records the provider returns for one query.
    /// Larger requests are truncated to this silently.
    fn max_results(&self) -> usize {
        DEFAULT_MAX_RESULTS
    }

    /// Whether the API key or opt-in this source needs is present.
    ///
    /// Unconfigured sources are skipped without any network call.
    fn is_configured(&self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Retry behaviour for providers known to rate-limit
    fn retry_policy(&self) -> Option<RetryConfig> {
        None
    }

    /// Search for records matching the query, returning at most `limit`
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<PublicationRecord>, SourceError>;

    /// Fetch the abstract of one record by its provider identifier.
    ///
    /// Returns [`NO_ABSTRACT`] when the record exists but has no abstract.
    async fn fetch_abstract(&self, _id: &str) -> Result<String, SourceError> {
        Err(SourceError::NotImplemented)
    }

    /// Cheapest valid request against the provider, checking the response
    /// has its expected top-level shape.
    async fn probe(&self) -> Result<(), SourceError>;
}

/// Clamp a requested limit to what a source supports
pub fn effective_limit(source: &dyn Source, requested: usize) -> usize {
    requested.min(source.max_results())
}

/// Errors that can occur when interacting with a source
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// The requested operation is not implemented for this source
    #[error("Operation not implemented for this source")]
    NotImplemented,

    /// Network or HTTP transport error
    #[error("Network error: {0}")]
    Network(String),

    /// Request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Parsing error (XML, JSON, HTML) or unexpected payload shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid request parameters
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The provider answered 429 Too Many Requests
    #[error("Rate limited")]
    RateLimit,

    /// Still rate limited after every retry attempt
    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    /// Credentials were rejected (401/403)
    #[error("Authentication rejected: {0}")]
    Auth(String),

    /// The source needs an API key that is not configured
    #[error("No API key configured ({0})")]
    MissingApiKey(String),

    /// The source is switched off
    #[error("Source disabled: {0}")]
    Disabled(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Non-success HTTP status from the source
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Other error
    #[error("Error: {0}")]
    Other(String),
}

impl SourceError {
    /// The tagged failure reason reported to callers
    pub fn kind(&self) -> FailureKind {
        match self {
            SourceError::NotImplemented => FailureKind::Unsupported,
            SourceError::Network(_) => FailureKind::Network,
            SourceError::Timeout(_) => FailureKind::Timeout,
            SourceError::Parse(_) => FailureKind::MalformedPayload,
            SourceError::RateLimit | SourceError::RateLimitExceeded { .. } => {
                FailureKind::RateLimited
            }
            SourceError::Auth(_) => FailureKind::Auth,
            SourceError::MissingApiKey(_) => FailureKind::MissingApiKey,
            SourceError::Disabled(_) => FailureKind::Disabled,
            SourceError::Api { .. } | SourceError::NotFound(_) => FailureKind::HttpStatus,
            SourceError::InvalidRequest(_) | SourceError::Other(_) => FailureKind::Other,
        }
    }

    /// HTTP status of the response that caused this error, if known
    pub fn status(&self) -> Option<u16> {
        match self {
            SourceError::Api { status, .. } => Some(*status),
            SourceError::RateLimit => Some(429),
            _ => None,
        }
    }

    /// Whether a later attempt could succeed
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::Api { status, .. } => *status >= 500,
            other => other.kind().is_transient(),
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout(err.to_string())
        } else if err.is_decode() {
            SourceError::Parse(err.to_string())
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Parse(format!("JSON: {}", err))
    }
}

impl From<quick_xml::Error> for SourceError {
    fn from(err: quick_xml::Error) -> Self {
        SourceError::Parse(format!("XML: {}", err))
    }
}
