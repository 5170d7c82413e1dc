//! Mock source for testing purposes.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::models::{PublicationRecord, SourceType};
use crate::sources::{Source, SourceCapabilities, SourceError};
use crate::utils::RetryConfig;

/// A mock source for testing that returns predefined responses.
///
/// Queued failures are returned first, one per search call; after that the
/// persistent error (if any) or the configured records are returned.
#[derive(Debug)]
pub struct MockSource {
    source_type: SourceType,
    records: Vec<PublicationRecord>,
    queued_failures: Mutex<VecDeque<SourceError>>,
    error: Option<SourceError>,
    not_configured: Option<SourceError>,
    reachable: bool,
    abstract_text: Option<String>,
    retry: Option<RetryConfig>,
    delay: Duration,
    search_calls: AtomicUsize,
    probe_calls: AtomicUsize,
}

impl MockSource {
    /// Create a reachable, configured mock that finds nothing
    pub fn new(source_type: SourceType) -> Self {
        Self {
            source_type,
            records: Vec::new(),
            queued_failures: Mutex::new(VecDeque::new()),
            error: None,
            not_configured: None,
            reachable: true,
            abstract_text: None,
            retry: None,
            delay: Duration::ZERO,
            search_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
        }
    }

    /// Return these records from every search
    pub fn with_records(mut self, records: Vec<PublicationRecord>) -> Self {
        self.records = records;
        self
    }

    /// Return `count` generated records titled "<source> paper N"
    pub fn with_record_count(self, count: usize) -> Self {
        let source = self.source_type;
        let records = (1..=count)
            .map(|i| make_record(source, &i.to_string(), &format!("{} paper {}", source.name(), i)))
            .collect();
        self.with_records(records)
    }

    /// Fail every search with `error`
    pub fn failing(mut self, error: SourceError) -> Self {
        self.error = Some(error);
        self
    }

    /// Fail the next `times` searches with `error`
    pub fn failing_times(self, times: usize, error: SourceError) -> Self {
        {
            let mut queue = self.lock_queue();
            queue.extend(std::iter::repeat(error).take(times));
        }
        self
    }

    /// Report the source as unconfigured
    pub fn unconfigured(mut self, error: SourceError) -> Self {
        self.not_configured = Some(error);
        self
    }

    /// Fail every probe
    pub fn unreachable(mut self) -> Self {
        self.reachable = false;
        self
    }

    pub fn with_abstract(mut self, text: impl Into<String>) -> Self {
        self.abstract_text = Some(text.into());
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryConfig) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Delay every search and probe
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Number of search calls made so far
    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    fn lock_queue(&self) -> std::sync::MutexGuard<'_, VecDeque<SourceError>> {
        self.queued_failures
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl Source for MockSource {
    fn source_type(&self) -> SourceType {
        self.source_type
    }

    fn capabilities(&self) -> SourceCapabilities {
        let mut caps = SourceCapabilities::SEARCH | SourceCapabilities::PROBE;
        if self.abstract_text.is_some() {
            caps |= SourceCapabilities::ABSTRACT;
        }
        caps
    }

    fn is_configured(&self) -> Result<(), SourceError> {
        match &self.not_configured {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn retry_policy(&self) -> Option<RetryConfig> {
        self.retry
    }

    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<PublicationRecord>, SourceError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        let queued = self.lock_queue().pop_front();
        if let Some(error) = queued {
            return Err(error);
        }
        if let Some(error) = &self.error {
            return Err(error.clone());
        }

        let limit = limit.min(self.max_results());
        Ok(self.records.iter().take(limit).cloned().collect())
    }

    async fn fetch_abstract(&self, _id: &str) -> Result<String, SourceError> {
        self.abstract_text.clone().ok_or(SourceError::NotImplemented)
    }

    async fn probe(&self) -> Result<(), SourceError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if self.reachable {
            Ok(())
        } else {
            Err(SourceError::Network("connection refused".to_string()))
        }
    }
}

/// Helper function to create a record for testing.
pub fn make_record(source: SourceType, identifier: &str, title: &str) -> PublicationRecord {
    let mut record = PublicationRecord::empty(source);
    record.identifier = identifier.to_string();
    record.title = title.to_string();
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queued_failures_then_records() {
        let source = MockSource::new(SourceType::SemanticScholar)
            .with_record_count(2)
            .failing_times(1, SourceError::RateLimit);

        assert!(matches!(
            source.search("q", 10).await,
            Err(SourceError::RateLimit)
        ));
        let records = source.search("q", 10).await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].title, "Semantic Scholar paper 1");
        assert_eq!(source.search_calls(), 2);
    }
}
