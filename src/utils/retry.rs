//! Retry on rate limiting for providers that answer HTTP 429.
//!
//! Only [`SourceError::RateLimit`] is retried. Every other error means a
//! query or credential problem that another attempt will not fix, so it is
//! returned immediately.

use std::time::Duration;
use tokio::time::sleep;

use crate::sources::SourceError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one
    pub max_attempts: u32,
    /// Fixed delay before each retry
    pub delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Result of a retried operation
#[derive(Debug)]
pub enum RetryResult<T> {
    /// Operation succeeded
    Success { value: T, attempts: u32 },
    /// Still rate limited when the attempts ran out
    RateLimitExhausted { attempts: u32 },
    /// Failed with an error that is not retried
    Failed { error: SourceError, attempts: u32 },
}

impl<T> RetryResult<T> {
    /// Number of attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            RetryResult::Success { attempts, .. }
            | RetryResult::RateLimitExhausted { attempts }
            | RetryResult::Failed { attempts, .. } => *attempts,
        }
    }

    /// Number of delays slept between attempts
    pub fn delays(&self) -> u32 {
        self.attempts().saturating_sub(1)
    }

    pub fn into_result(self) -> Result<T, SourceError> {
        match self {
            RetryResult::Success { value, .. } => Ok(value),
            RetryResult::RateLimitExhausted { attempts } => {
                Err(SourceError::RateLimitExceeded { attempts })
            }
            RetryResult::Failed { error, .. } => Err(error),
        }
    }
}

/// Execute an async operation, retrying while it is rate limited
pub async fn with_retry<T, F, Fut>(config: RetryConfig, operation: F) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, SourceError>>,
{
    with_retry_detailed(config, operation).await.into_result()
}

/// Execute an async operation with retry logic that returns [`RetryResult`]
///
/// This provides attempt counts for callers that report them
pub async fn with_retry_detailed<T, F, Fut>(config: RetryConfig, mut operation: F) -> RetryResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, SourceError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    tracing::info!(
                        "Operation succeeded on attempt {} after {} rate-limited responses",
                        attempts,
                        attempts - 1
                    );
                }
                return RetryResult::Success { value, attempts };
            }
            Err(SourceError::RateLimit) if attempts < max_attempts => {
                tracing::debug!(
                    "Rate limited on attempt {}/{}, retrying in {:?}",
                    attempts,
                    max_attempts,
                    config.delay
                );
                sleep(config.delay).await;
            }
            Err(SourceError::RateLimit) => {
                tracing::warn!("Rate limit exceeded after {} attempts", attempts);
                return RetryResult::RateLimitExhausted { attempts };
            }
            Err(error) => {
                tracing::debug!("Not retrying after error: {}", error);
                return RetryResult::Failed { error, attempts };
            }
        }
    }
}
