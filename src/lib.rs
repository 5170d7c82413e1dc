//! # Literature Scout
//!
//! Search several scholarly literature providers at once and get back one
//! list of records in a single canonical shape.
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`models`]: Core data structures (PublicationRecord, SearchRequest, AggregatedResult)
//! - [`sources`]: Provider clients behind the [`Source`] trait, the registry and the connection probe
//! - [`normalize`]: Declarative per-provider field mappings onto [`PublicationRecord`]
//! - [`aggregate`]: Concurrent fan-out of one query with partial-failure tolerance
//! - [`session`]: Caller-owned search state (latest result, selection, narrowing, export)
//! - [`utils`]: HTTP client, retry on rate limiting, export
//! - [`config`]: Configuration management
//!
//! ## Example
//!
//! ```rust,no_run
//! use literature_scout::config::Config;
//! use literature_scout::models::{SearchRequest, SourceType};
//! use literature_scout::{SearchAggregator, SourceRegistry};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::default();
//! let aggregator = SearchAggregator::from_config(SourceRegistry::from_config(&config)?, &config.search);
//!
//! let request = SearchRequest::new("cancer immunotherapy")
//!     .provider(SourceType::PubMed)
//!     .provider(SourceType::EuropePmc)
//!     .limit(10);
//! let result = aggregator.aggregate(&request).await;
//!
//! for record in &result.records {
//!     println!("[{}] {} ({})", record.source, record.title, record.year);
//! }
//! # Ok(())
//! # }
//! ```

pub mod aggregate;
pub mod config;
pub mod models;
pub mod normalize;
pub mod session;
pub mod sources;
pub mod utils;

// Re-export commonly used types
pub use aggregate::SearchAggregator;
pub use models::{AggregatedResult, PublicationRecord, SearchRequest, SourceType};
pub use session::SearchSession;
pub use sources::{Source, SourceRegistry};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
