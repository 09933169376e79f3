//! Error types for the indexing and answering core.
//!
//! Only the index lifecycle manager returns these to its callers. Every layer
//! above it (ingestion, answer engine, tools) converts them into a logged
//! diagnostic plus a plain-string outcome.

use thiserror::Error;

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, RecallError>;

/// Errors produced by the embedding, generation, and index layers.
#[derive(Error, Debug)]
pub enum RecallError {
    /// Embedding or generation service failed (network, auth, bad response).
    #[error("provider error: {0}")]
    Provider(String),

    /// A new index could not be built; the previous live index is untouched.
    #[error("index initialization failed: {0}")]
    IndexInit(String),

    /// Appending units to the live index failed. `committed` units from
    /// earlier batches are already searchable.
    #[error("index insertion failed: {detail}")]
    IndexInsert { committed: usize, detail: String },

    /// No index has been created yet. Queries treat this as an empty result.
    #[error("index not initialized")]
    IndexNotInitialized,

    /// A raw message was malformed. The ingestion pipeline filters these out.
    #[error("invalid message: {0}")]
    Validation(String),
}

impl RecallError {
    pub fn provider<E: std::fmt::Display>(err: E) -> Self {
        RecallError::Provider(err.to_string())
    }
}

impl From<reqwest::Error> for RecallError {
    fn from(err: reqwest::Error) -> Self {
        RecallError::Provider(err.to_string())
    }
}
