//! Failure taxonomy for a single search request.

use thiserror::Error;

/// Terminal outcome of a failed search. Every variant ends the request;
/// nothing here is retried by the orchestrator.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Missing, empty or out-of-bounds query. Maps to 400.
    #[error("{0}")]
    InvalidInput(String),

    /// The aggregator failed, timed out or returned no sources.
    #[error("{0}")]
    AggregationFailed(String),

    /// The generator failed, timed out or returned empty markup.
    #[error("{0}")]
    GenerationFailed(String),

    /// The page or one of its results could not be written.
    #[error("{0}")]
    PersistenceFailed(String),

    /// Anything else. Detail stays in the server log.
    #[error("Server error")]
    Unexpected(#[from] anyhow::Error),
}

impl SearchError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, SearchError::InvalidInput(_))
    }
}
