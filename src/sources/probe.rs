//! Lightweight provider health checks.

use futures_util::future::join_all;
use std::sync::Arc;
use std::time::Duration;

use crate::models::SourceType;
use crate::sources::{Source, SourceError};

/// Probe timeout used when none is configured
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest a probe may wait for a provider
pub const MAX_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Checks whether providers are reachable and answer with their expected shape
#[derive(Debug, Clone, Copy)]
pub struct ConnectionProbe {
    timeout: Duration,
}

impl Default for ConnectionProbe {
    fn default() -> Self {
        Self::new(DEFAULT_PROBE_TIMEOUT)
    }
}

impl ConnectionProbe {
    /// Create a probe; the timeout is clamped to [`MAX_PROBE_TIMEOUT`]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout: timeout.min(MAX_PROBE_TIMEOUT),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Probe one source, keeping the reason it is unreachable.
    ///
    /// Unconfigured sources fail without a network call.
    pub async fn diagnose(&self, source: &dyn Source) -> Result<(), SourceError> {
        source.is_configured()?;

        match tokio::time::timeout(self.timeout, source.probe()).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::Timeout(format!(
                "no answer within {:?}",
                self.timeout
            ))),
        }
    }

    /// True if the source answered the probe in time with a valid payload
    pub async fn check(&self, source: &dyn Source) -> bool {
        match self.diagnose(source).await {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!("Probe of {} failed: {}", source.name(), e);
                false
            }
        }
    }

    /// Probe several sources concurrently, keeping each failure reason.
    /// Results are in input order.
    pub async fn diagnose_all(
        &self,
        sources: &[Arc<dyn Source>],
    ) -> Vec<(SourceType, Result<(), SourceError>)> {
        join_all(sources.iter().map(|source| async move {
            (source.source_type(), self.diagnose(source.as_ref()).await)
        }))
        .await
    }

    /// Probe several sources concurrently; results are in input order
    pub async fn check_all(&self, sources: &[Arc<dyn Source>]) -> Vec<(SourceType, bool)> {
        self.diagnose_all(sources)
            .await
            .into_iter()
            .map(|(source, result)| {
                if let Err(e) = &result {
                    tracing::debug!("Probe of {} failed: {}", source.name(), e);
                }
                (source, result.is_ok())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MockSource;

    #[test]
    fn test_timeout_is_clamped() {
        assert_eq!(ConnectionProbe::default().timeout(), DEFAULT_PROBE_TIMEOUT);
        assert_eq!(
            ConnectionProbe::new(Duration::from_secs(60)).timeout(),
            MAX_PROBE_TIMEOUT
        );
        assert_eq!(
            ConnectionProbe::new(Duration::from_secs(2)).timeout(),
            Duration::from_secs(2)
        );
    }

    #[tokio::test]
    async fn test_check_reachable_and_unreachable() {
        let probe = ConnectionProbe::default();
        let up = MockSource::new(SourceType::PubMed);
        let down = MockSource::new(SourceType::OpenAlex).unreachable();

        assert!(probe.check(&up).await);
        assert!(!probe.check(&down).await);
        assert_eq!(up.probe_calls(), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_source_is_not_contacted() {
        let probe = ConnectionProbe::default();
        let core = MockSource::new(SourceType::Core)
            .unconfigured(SourceError::MissingApiKey("CORE_API_KEY".into()));

        assert!(matches!(
            probe.diagnose(&core).await,
            Err(SourceError::MissingApiKey(_))
        ));
        assert_eq!(core.probe_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_probe_times_out() {
        let probe = ConnectionProbe::new(Duration::from_secs(1));
        let slow = MockSource::new(SourceType::SemanticScholar).with_delay(Duration::from_secs(5));

        assert!(matches!(
            probe.diagnose(&slow).await,
            Err(SourceError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_check_all_preserves_order() {
        let sources: Vec<Arc<dyn Source>> = vec![
            Arc::new(MockSource::new(SourceType::EuropePmc).unreachable()),
            Arc::new(MockSource::new(SourceType::PubMed)),
        ];

        let results = ConnectionProbe::default().check_all(&sources).await;
        assert_eq!(
            results,
            vec![(SourceType::EuropePmc, false), (SourceType::PubMed, true)]
        );
    }

    #[tokio::test]
    async fn test_diagnose_all_keeps_reasons() {
        let sources: Vec<Arc<dyn Source>> = vec![
            Arc::new(MockSource::new(SourceType::OpenAlex)),
            Arc::new(
                MockSource::new(SourceType::Core)
                    .unconfigured(SourceError::MissingApiKey("CORE_API_KEY".into())),
            ),
            Arc::new(MockSource::new(SourceType::EuropePmc).unreachable()),
        ];

        let results = ConnectionProbe::default().diagnose_all(&sources).await;
        let order: Vec<SourceType> = results.iter().map(|(s, _)| *s).collect();
        assert_eq!(
            order,
            vec![SourceType::OpenAlex, SourceType::Core, SourceType::EuropePmc]
        );
        assert!(results[0].1.is_ok());
        assert!(matches!(results[1].1, Err(SourceError::MissingApiKey(_))));
        assert!(matches!(results[2].1, Err(SourceError::Network(_))));
    }
}
