//! HTTP client utilities.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::sources::SourceError;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Shared HTTP client with mandatory timeouts and optional request pacing
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    limiter: Option<Arc<DirectLimiter>>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("client", &self.client)
            .field("rate_limited", &self.limiter.is_some())
            .finish()
    }
}

impl HttpClient {
    /// Create a new HTTP client with default settings
    pub fn new() -> Result<Self, SourceError> {
        Self::with_config(&HttpConfig::default())
    }

    /// Create a client from the `[http]` configuration section
    pub fn with_config(config: &HttpConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Other(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            limiter: None,
        })
    }

    /// Space requests made through this client to at most `per_second`
    pub fn rate_limited(mut self, per_second: NonZeroU32) -> Self {
        self.limiter = Some(Arc::new(RateLimiter::direct(Quota::per_second(per_second))));
        self
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Start a GET request
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.client.get(url)
    }

    /// Send a request, mapping transport failures and non-success statuses
    /// onto [`SourceError`]
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, SourceError> {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }

    /// Send a request and parse the body as JSON
    pub async fn json(&self, request: RequestBuilder) -> Result<Value, SourceError> {
        let text = self.text(request).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Send a request and return the body as text
    pub async fn text(&self, request: RequestBuilder) -> Result<String, SourceError> {
        let response = self.send(request).await?;
        response
            .text()
            .await
            .map_err(|e| SourceError::Network(format!("Failed to read response: {}", e)))
    }
}

/// Classify a non-success HTTP status
pub fn status_error(status: StatusCode, body: &str) -> SourceError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => SourceError::RateLimit,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            SourceError::Auth(format!("HTTP {}", status.as_u16()))
        }
        StatusCode::NOT_FOUND => SourceError::NotFound(truncate(body, 200)),
        _ => SourceError::Api {
            status: status.as_u16(),
            message: truncate(body, 200),
        },
    }
}

/// Fail with a parse error unless `value` has the top-level `key`
pub fn expect_key(value: &Value, key: &str) -> Result<(), SourceError> {
    if value.get(key).is_some() {
        Ok(())
    } else {
        Err(SourceError::Parse(format!("response has no '{}' field", key)))
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    let trimmed = text.trim();
    match trimmed.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &trimmed[..idx]),
        None => trimmed.to_string(),
    }
}
