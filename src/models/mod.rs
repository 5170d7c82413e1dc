//! Core data models for publication records and search operations.

mod record;
mod search;

pub use record::{PublicationRecord, SourceType, UnknownSource};
pub use search::{
    AggregatedResult, FailureKind, ProviderFailure, ProviderOutcome, SearchRequest, DEFAULT_LIMIT,
};
