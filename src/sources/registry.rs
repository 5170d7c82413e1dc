//! Registry of the configured provider clients.

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    CoreSource, EuropePmcSource, GoogleScholarSource, OpenAlexSource, PubMedSource,
    SemanticScholarSource, Source, SourceError,
};
use crate::config::Config;
use crate::models::SourceType;
use crate::utils::HttpClient;

bitflags::bitflags! {
    /// Capabilities that a source can support
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SourceCapabilities: u32 {
        const SEARCH = 1 << 0;
        const ABSTRACT = 1 << 1;
        const PROBE = 1 << 2;
        const REQUIRES_API_KEY = 1 << 3;
    }
}

/// Registry for all available sources, keyed by provider
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: HashMap<SourceType, Arc<dyn Source>>,
}

impl SourceRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every provider, sharing one HTTP client
    pub fn from_config(config: &Config) -> Result<Self, SourceError> {
        let client = Arc::new(HttpClient::with_config(&config.http)?);
        let mut registry = Self::new();

        registry.register(Arc::new(PubMedSource::from_config(&client, config)));
        registry.register(Arc::new(EuropePmcSource::new(Arc::clone(&client))));
        registry.register(Arc::new(CoreSource::from_config(Arc::clone(&client), config)));
        registry.register(Arc::new(OpenAlexSource::from_config(Arc::clone(&client), config)));
        registry.register(Arc::new(GoogleScholarSource::from_config(Arc::clone(&client), config)));
        registry.register(Arc::new(SemanticScholarSource::from_config(client, config)));

        Ok(registry)
    }

    /// Register a source, replacing any previous one for the same provider
    pub fn register(&mut self, source: Arc<dyn Source>) {
        self.sources.insert(source.source_type(), source);
    }

    /// Get a source by provider
    pub fn get(&self, source: SourceType) -> Option<&Arc<dyn Source>> {
        self.sources.get(&source)
    }

    /// Get a source by provider, returning an error if not registered
    pub fn get_required(&self, source: SourceType) -> Result<&Arc<dyn Source>, SourceError> {
        self.get(source).ok_or_else(|| {
            SourceError::InvalidRequest(format!("Source '{}' is not registered", source.id()))
        })
    }

    /// All registered sources, in provider listing order
    pub fn all(&self) -> Vec<&Arc<dyn Source>> {
        SourceType::ALL
            .iter()
            .filter_map(|source| self.sources.get(source))
            .collect()
    }

    /// Get sources that support a specific capability
    pub fn with_capability(&self, capability: SourceCapabilities) -> Vec<&Arc<dyn Source>> {
        self.all()
            .into_iter()
            .filter(|s| s.capabilities().contains(capability))
            .collect()
    }

    pub fn has(&self, source: SourceType) -> bool {
        self.sources.contains_key(&source)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
