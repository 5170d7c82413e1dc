//! Utility modules supporting provider clients.
//!
//! - [`HttpClient`]: HTTP client with mandatory timeouts and optional request pacing
//! - [`status_error`]: map a non-success HTTP status onto a [`crate::sources::SourceError`]
//! - [`RetryConfig`]: retry policy for providers that answer HTTP 429
//! - [`with_retry`]: execute an operation, retrying only while it is rate limited
//! - [`export_csv`] / [`export_json`]: write records as a downloadable table
//!
//! # Retry on rate limiting
//!
//! ```rust,no_run
//! use literature_scout::sources::SourceError;
//! use literature_scout::utils::{with_retry, RetryConfig};
//!
//! # async fn fetch() -> Result<String, SourceError> { Ok("data".to_string()) }
//! # #[tokio::main]
//! # async fn main() -> Result<(), SourceError> {
//! let data = with_retry(RetryConfig::default(), || fetch()).await?;
//! # Ok(())
//! # }
//! ```

mod export;
mod http;
mod retry;

pub use export::{export_csv, export_json, write_export, ExportError, ExportFormat};
pub use http::{expect_key, status_error, HttpClient};
pub use retry::{with_retry, with_retry_detailed, RetryConfig, RetryResult};
