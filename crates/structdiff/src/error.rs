//! Error types.
//!
//! The diff engine and the portable-text reconciler have no error type of
//! their own: schema disagreements and unresolved references degrade to
//! flagged nodes instead of failing the diff.

use structdiff_path::PathError;
use thiserror::Error;

/// Failure applying a mutation to a document pair.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MutationError {
    #[error("document not found: {0}")]
    DocumentNotFound(String),
    #[error("document already exists: {0}")]
    AlreadyExists(String),
    #[error("path not found: {0}")]
    PathNotFound(String),
    #[error("invalid target at {0}")]
    InvalidTarget(String),
    #[error("not a number at {0}")]
    NotANumber(String),
    #[error("invalid mutation: {0}")]
    Invalid(String),
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Failure loading a schema definition.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid schema definition: {0}")]
    Invalid(#[from] serde_json::Error),
    #[error("duplicate type name: {0}")]
    DuplicateType(String),
}

/// Failure talking to the document history source.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HistoryError {
    /// The history source errored or timed out. Retryable.
    #[error("history fetch failed: {0}")]
    Fetch(String),
    /// The fetch was cancelled because the owning pane closed.
    #[error("history fetch cancelled")]
    Cancelled,
    /// The controller has been closed; no further work is accepted.
    #[error("history controller closed")]
    Closed,
    /// A fetched transaction could not be folded onto the snapshot.
    #[error("transaction {id} failed to apply: {source}")]
    Apply {
        id: String,
        #[source]
        source: MutationError,
    },
}

impl HistoryError {
    /// True for failures that leave the timeline usable and may succeed on
    /// the next `update` call.
    pub fn is_retryable(&self) -> bool {
        matches!(self, HistoryError::Fetch(_))
    }
}

/// Failure loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration value: {0}")]
    Value(String),
}
