//! Fan a query out to several providers and merge what comes back.
//!
//! Providers are queried concurrently, at most `max_concurrency` at a time,
//! but the merged list always follows the order the providers were enabled
//! in. A provider that fails contributes no records and a tagged
//! [`ProviderOutcome`]; it never takes the other providers down with it.

use futures_util::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use crate::config::SearchConfig;
use crate::models::{
    AggregatedResult, FailureKind, ProviderFailure, ProviderOutcome, PublicationRecord,
    SearchRequest, SourceType,
};
use crate::sources::{ConnectionProbe, Source, SourceError, SourceRegistry};
use crate::utils::with_retry;

/// Providers queried at the same time when not configured
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Upper bound on one search attempt against one provider
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

/// Runs one logical search across the enabled providers
#[derive(Debug, Clone)]
pub struct SearchAggregator {
    registry: Arc<SourceRegistry>,
    max_concurrency: usize,
    provider_timeout: Duration,
    probe: Option<ConnectionProbe>,
}

impl SearchAggregator {
    pub fn new(registry: SourceRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
            probe: None,
        }
    }

    /// Apply the `[search]` configuration section
    pub fn from_config(registry: SourceRegistry, config: &SearchConfig) -> Self {
        let probe = config
            .probe_before_search
            .then(|| ConnectionProbe::new(Duration::from_secs(config.probe_timeout_secs)));

        Self::new(registry)
            .with_max_concurrency(config.max_concurrency)
            .with_provider_timeout(Duration::from_secs(config.provider_timeout_secs))
            .with_probe(probe)
    }

    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    pub fn with_provider_timeout(mut self, timeout: Duration) -> Self {
        self.provider_timeout = timeout;
        self
    }

    /// Skip providers that fail this probe before searching them
    pub fn with_probe(mut self, probe: Option<ConnectionProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Search every enabled provider and concatenate the results in the
    /// declared provider order.
    ///
    /// Never fails: each provider's failure is reported in
    /// [`AggregatedResult::outcomes`].
    pub async fn aggregate(&self, request: &SearchRequest) -> AggregatedResult {
        let mut result = AggregatedResult::empty(&request.query);
        if request.enabled_providers().is_empty() {
            return result;
        }

        tracing::debug!(
            "Searching {} providers for '{}' (limit {})",
            request.enabled_providers().len(),
            request.query,
            request.limit
        );

        let responses: Vec<(SourceType, Result<Vec<PublicationRecord>, ProviderFailure>)> =
            stream::iter(request.enabled_providers().iter().copied())
                .map(|source| async move {
                    let response = self.query_provider(source, &request.query, request.limit).await;
                    (source, response)
                })
                .buffered(self.max_concurrency)
                .collect()
                .await;

        for (source, response) in responses {
            match response {
                Ok(records) => {
                    result
                        .outcomes
                        .push(ProviderOutcome::success(source, records.len()));
                    result.records.extend(records);
                }
                Err(failure) => {
                    tracing::warn!("Search failed for {}: {}", source.name(), failure.message);
                    result.outcomes.push(ProviderOutcome {
                        source,
                        records: 0,
                        failure: Some(failure),
                    });
                }
            }
        }

        result
    }

    /// Fetch one record's abstract from its provider
    pub async fn fetch_abstract(&self, source: SourceType, id: &str) -> Result<String, SourceError> {
        let client = self.registry.get_required(source)?;
        client.is_configured()?;
        client.fetch_abstract(id).await
    }

    async fn query_provider(
        &self,
        source_type: SourceType,
        query: &str,
        limit: usize,
    ) -> Result<Vec<PublicationRecord>, ProviderFailure> {
        let source = self.registry.get(source_type).ok_or_else(|| {
            ProviderFailure::new(
                FailureKind::NotRegistered,
                format!("no client registered for {}", source_type.name()),
            )
        })?;

        source.is_configured().map_err(failure)?;

        if let Some(probe) = &self.probe {
            if let Err(e) = probe.diagnose(source.as_ref()).await {
                return Err(ProviderFailure::new(FailureKind::Unreachable, e.to_string()));
            }
        }

        let records = match source.retry_policy() {
            Some(policy) => {
                with_retry(policy, || self.search_once(source.as_ref(), query, limit)).await
            }
            None => self.search_once(source.as_ref(), query, limit).await,
        }
        .map_err(failure)?;

        Ok(tag_records(source_type, records))
    }

    /// One search attempt, bounded by the provider timeout
    async fn search_once(
        &self,
        source: &dyn Source,
        query: &str,
        limit: usize,
    ) -> Result<Vec<PublicationRecord>, SourceError> {
        match tokio::time::timeout(self.provider_timeout, source.search(query, limit)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(format!(
                "no answer within {:?}",
                self.provider_timeout
            ))),
        }
    }
}

fn failure(error: SourceError) -> ProviderFailure {
    ProviderFailure::new(error.kind(), error.to_string()).with_status(error.status())
}

/// Every record must name the provider that produced it
fn tag_records(source: SourceType, mut records: Vec<PublicationRecord>) -> Vec<PublicationRecord> {
    for record in records.iter_mut().filter(|r| r.source != source) {
        tracing::debug!("Retagging record {} as {}", record.identifier, source.id());
        record.source = source;
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::mock::make_record;
    use crate::sources::MockSource;
    use crate::utils::RetryConfig;

    fn aggregator(sources: Vec<MockSource>) -> SearchAggregator {
        let mut registry = SourceRegistry::new();
        for source in sources {
            registry.register(Arc::new(source));
        }
        SearchAggregator::new(registry)
    }

    #[tokio::test]
    async fn test_empty_request_queries_nobody() {
        let pubmed = Arc::new(MockSource::new(SourceType::PubMed).with_record_count(3));
        let mut registry = SourceRegistry::new();
        registry.register(pubmed.clone());
        let aggregator = SearchAggregator::new(registry);

        let result = aggregator.aggregate(&SearchRequest::new("cancer")).await;

        assert!(result.is_empty());
        assert!(result.outcomes.is_empty());
        assert_eq!(pubmed.search_calls(), 0);
    }

    #[tokio::test]
    async fn test_declared_order_is_kept() {
        let aggregator = aggregator(vec![
            MockSource::new(SourceType::PubMed).with_record_count(3),
            MockSource::new(SourceType::EuropePmc).with_record_count(2),
        ]);

        let request = SearchRequest::new("cancer")
            .provider(SourceType::EuropePmc)
            .provider(SourceType::PubMed);
        let result = aggregator.aggregate(&request).await;

        let sources: Vec<SourceType> = result.records.iter().map(|r| r.source).collect();
        assert_eq!(
            sources,
            vec![
                SourceType::EuropePmc,
                SourceType::EuropePmc,
                SourceType::PubMed,
                SourceType::PubMed,
                SourceType::PubMed
            ]
        );
        assert_eq!(result.outcomes[0], ProviderOutcome::success(SourceType::EuropePmc, 2));
        assert_eq!(result.outcomes[1], ProviderOutcome::success(SourceType::PubMed, 3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_first_provider_still_comes_first() {
        let aggregator = aggregator(vec![
            MockSource::new(SourceType::OpenAlex)
                .with_record_count(1)
                .with_delay(Duration::from_secs(3)),
            MockSource::new(SourceType::Core).with_record_count(1),
        ]);

        let request = SearchRequest::new("q")
            .provider(SourceType::OpenAlex)
            .provider(SourceType::Core);
        let result = aggregator.aggregate(&request).await;

        assert_eq!(result.records[0].source, SourceType::OpenAlex);
        assert_eq!(result.records[1].source, SourceType::Core);
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_other_providers() {
        let aggregator = aggregator(vec![
            MockSource::new(SourceType::PubMed).with_record_count(2),
            MockSource::new(SourceType::EuropePmc).failing(SourceError::Api {
                status: 500,
                message: "boom".into(),
            }),
            MockSource::new(SourceType::OpenAlex).with_record_count(1),
        ]);

        let request = SearchRequest::new("q").providers([
            SourceType::PubMed,
            SourceType::EuropePmc,
            SourceType::OpenAlex,
        ]);
        let result = aggregator.aggregate(&request).await;

        assert_eq!(result.len(), 3);
        let failures: Vec<&ProviderOutcome> = result.failures().collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].source, SourceType::EuropePmc);
        let failure = failures[0].failure.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::HttpStatus);
        assert_eq!(failure.status, Some(500));
        assert!(failure.is_transient());
    }

    #[tokio::test]
    async fn test_unconfigured_and_unregistered() {
        let core = Arc::new(
            MockSource::new(SourceType::Core)
                .with_record_count(5)
                .unconfigured(SourceError::MissingApiKey("CORE_API_KEY".into())),
        );
        let mut registry = SourceRegistry::new();
        registry.register(core.clone());
        let aggregator = SearchAggregator::new(registry);

        let request = SearchRequest::new("q")
            .provider(SourceType::Core)
            .provider(SourceType::SemanticScholar);
        let result = aggregator.aggregate(&request).await;

        assert!(result.is_empty());
        assert_eq!(core.search_calls(), 0);
        let kinds: Vec<FailureKind> = result
            .outcomes
            .iter()
            .map(|o| o.failure.as_ref().unwrap().kind)
            .collect();
        assert_eq!(kinds, vec![FailureKind::MissingApiKey, FailureKind::NotRegistered]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_provider_is_retried() {
        let semantic = Arc::new(
            MockSource::new(SourceType::SemanticScholar)
                .with_record_count(1)
                .with_retry_policy(RetryConfig::default())
                .failing_times(2, SourceError::RateLimit),
        );
        let mut registry = SourceRegistry::new();
        registry.register(semantic.clone());
        let aggregator = SearchAggregator::new(registry);

        let request = SearchRequest::new("q").provider(SourceType::SemanticScholar);
        let result = aggregator.aggregate(&request).await;

        assert_eq!(result.len(), 1);
        assert_eq!(semantic.search_calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limit_exhausted_is_reported() {
        let aggregator = aggregator(vec![MockSource::new(SourceType::SemanticScholar)
            .with_retry_policy(RetryConfig::default())
            .failing(SourceError::RateLimit)]);

        let request = SearchRequest::new("q").provider(SourceType::SemanticScholar);
        let result = aggregator.aggregate(&request).await;

        let failure = result.outcomes[0].failure.as_ref().unwrap();
        assert_eq!(failure.kind, FailureKind::RateLimited);
        assert_eq!(failure.message, "Rate limit exceeded after 3 attempts");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_provider_times_out() {
        let aggregator = aggregator(vec![MockSource::new(SourceType::OpenAlex)
            .with_record_count(1)
            .with_delay(Duration::from_secs(60))])
        .with_provider_timeout(Duration::from_secs(15));

        let request = SearchRequest::new("q").provider(SourceType::OpenAlex);
        let result = aggregator.aggregate(&request).await;

        assert!(result.is_empty());
        assert_eq!(
            result.outcomes[0].failure.as_ref().unwrap().kind,
            FailureKind::Timeout
        );
    }

    #[tokio::test]
    async fn test_probe_gate_skips_unreachable() {
        let europe = Arc::new(MockSource::new(SourceType::EuropePmc).with_record_count(2).unreachable());
        let mut registry = SourceRegistry::new();
        registry.register(europe.clone());
        let aggregator = SearchAggregator::new(registry).with_probe(Some(ConnectionProbe::default()));

        let request = SearchRequest::new("q").provider(SourceType::EuropePmc);
        let result = aggregator.aggregate(&request).await;

        assert_eq!(
            result.outcomes[0].failure.as_ref().unwrap().kind,
            FailureKind::Unreachable
        );
        assert_eq!(europe.probe_calls(), 1);
        assert_eq!(europe.search_calls(), 0);
    }

    #[tokio::test]
    async fn test_records_are_tagged_with_their_provider() {
        let aggregator = aggregator(vec![MockSource::new(SourceType::OpenAlex)
            .with_records(vec![make_record(SourceType::PubMed, "1", "mislabelled")])]);

        let request = SearchRequest::new("q").provider(SourceType::OpenAlex);
        let result = aggregator.aggregate(&request).await;

        assert_eq!(result.records[0].source, SourceType::OpenAlex);
    }

    #[tokio::test]
    async fn test_fetch_abstract_routes_to_provider() {
        let aggregator = aggregator(vec![
            MockSource::new(SourceType::PubMed).with_abstract("An abstract."),
        ]);

        assert_eq!(
            aggregator.fetch_abstract(SourceType::PubMed, "1").await.unwrap(),
            "An abstract."
        );
        assert!(aggregator.fetch_abstract(SourceType::Core, "1").await.is_err());
    }
}
