//! Error taxonomy for the ingestion and retrieval core.
//!
//! Command runners wrap these in `anyhow` for reporting; the variants exist so
//! callers can tell a misconfigured collection from an unreachable backend,
//! and a per-file content problem from a fatal one.

use thiserror::Error;

/// Errors produced by the RAG core.
#[derive(Debug, Error)]
pub enum RagError {
    /// Invalid or inconsistent configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A collection exists with a different dimensionality than requested,
    /// or a vector does not match its collection.
    #[error(
        "dimension mismatch for collection '{collection}': expected {expected}, found {found}"
    )]
    DimensionMismatch {
        collection: String,
        expected: usize,
        found: usize,
    },

    /// The vector-store backend could not be reached.
    #[error("vector store unavailable ({backend}): {message}")]
    StoreUnavailable { backend: String, message: String },

    /// The vector-store backend was reachable but the operation failed.
    #[error("vector store error ({backend}): {message}")]
    Store { backend: String, message: String },

    /// The language model could not be reached or returned an unusable response.
    #[error("language model error: {0}")]
    Llm(String),

    /// Embedding generation failed.
    #[error("embedding error ({model}): {message}")]
    Embedding { model: String, message: String },

    /// A file could not be read, decoded or embedded.
    #[error("content error ({path}): {message}")]
    Content { path: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// True for errors that only affect a single file and must not abort a batch.
    pub fn is_content(&self) -> bool {
        matches!(self, RagError::Content { .. })
    }
}

/// Result alias for the RAG core.
pub type Result<T> = std::result::Result<T, RagError>;
