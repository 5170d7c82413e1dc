//! Search request and aggregated response models.

use serde::{Deserialize, Serialize};

use crate::models::{PublicationRecord, SourceType};

/// Default number of records requested from each provider
pub const DEFAULT_LIMIT: usize = 25;

/// One logical search submitted by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Free-text query, passed to every provider verbatim
    pub query: String,

    /// Providers to query, in the order their results are concatenated
    enabled_providers: Vec<SourceType>,

    /// Maximum number of records requested per provider
    pub limit: usize,
}

impl SearchRequest {
    /// Create a request with no providers enabled
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            enabled_providers: Vec::new(),
            limit: DEFAULT_LIMIT,
        }
    }

    /// Enable a provider. Enabling the same provider twice keeps its first position.
    pub fn provider(mut self, source: SourceType) -> Self {
        if !self.enabled_providers.contains(&source) {
            self.enabled_providers.push(source);
        }
        self
    }

    /// Enable several providers in order
    pub fn providers(self, sources: impl IntoIterator<Item = SourceType>) -> Self {
        sources.into_iter().fold(self, |req, s| req.provider(s))
    }

    /// Set the per-provider limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn enabled_providers(&self) -> &[SourceType] {
        &self.enabled_providers
    }
}

/// Why a provider contributed nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Network,
    Auth,
    MissingApiKey,
    Disabled,
    RateLimited,
    HttpStatus,
    MalformedPayload,
    Unsupported,
    NotRegistered,
    Unreachable,
    Other,
}

impl FailureKind {
    /// Short human label used in diagnostics
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Timeout => "timed out",
            FailureKind::Network => "network error",
            FailureKind::Auth => "authentication rejected",
            FailureKind::MissingApiKey => "no API key configured",
            FailureKind::Disabled => "disabled",
            FailureKind::RateLimited => "rate limit exceeded",
            FailureKind::HttpStatus => "HTTP error",
            FailureKind::MalformedPayload => "malformed response",
            FailureKind::Unsupported => "not supported",
            FailureKind::NotRegistered => "not registered",
            FailureKind::Unreachable => "unreachable",
            FailureKind::Other => "error",
        }
    }

    /// Failures that may succeed on a later attempt.
    ///
    /// `HttpStatus` depends on the status code, so it is never transient at
    /// this level; see [`ProviderFailure::is_transient`].
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureKind::Timeout | FailureKind::Network | FailureKind::RateLimited
        )
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A tagged provider failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderFailure {
    pub kind: FailureKind,
    pub message: String,

    /// Status of the provider's error response, if it sent one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl ProviderFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: Option<u16>) -> Self {
        self.status = status;
        self
    }

    /// Like [`FailureKind::is_transient`], with 5xx responses counted as transient
    pub fn is_transient(&self) -> bool {
        match self.kind {
            FailureKind::HttpStatus => self.status.is_some_and(|status| status >= 500),
            kind => kind.is_transient(),
        }
    }
}

/// What one provider contributed to an aggregated search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderOutcome {
    pub source: SourceType,

    /// Number of records this provider added to the result
    pub records: usize,

    /// Set when the provider failed; `records` is then zero
    pub failure: Option<ProviderFailure>,
}

impl ProviderOutcome {
    pub fn success(source: SourceType, records: usize) -> Self {
        Self {
            source,
            records,
            failure: None,
        }
    }

    pub fn failed(source: SourceType, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            source,
            records: 0,
            failure: Some(ProviderFailure::new(kind, message)),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// Records from every enabled provider, concatenated in declared order.
///
/// Records are never deduplicated or re-ranked across providers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedResult {
    pub query: String,
    pub records: Vec<PublicationRecord>,
    pub outcomes: Vec<ProviderOutcome>,
}

impl AggregatedResult {
    pub fn empty(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Outcomes of providers that failed
    pub fn failures(&self) -> impl Iterator<Item = &ProviderOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    /// Records produced by one provider
    pub fn from_source(&self, source: SourceType) -> impl Iterator<Item = &PublicationRecord> {
        self.records.iter().filter(move |r| r.source == source)
    }
}
