//! Error types for the trustlog core library.
//!
//! Storage and structural failures are kept apart from proof and signature
//! failures so callers can decide which ones are fatal to them.

use thiserror::Error;

/// Errors that can occur in trustlog core operations.
#[derive(Debug, Error)]
pub enum TrustlogError {
    /// A key was absent from the store.
    #[error("Object not found: '{key}' in bucket '{bucket}'")]
    ObjectNotFound {
        /// Slash-joined bucket path
        bucket: String,
        /// Hex-encoded key
        key: String,
    },

    /// A tree node that must exist for the current size is missing.
    #[error("Missing tree node at level {level}, index {index}")]
    MissingNode {
        /// Tree level (0 = leaves)
        level: usize,
        /// Index within the level
        index: u64,
    },

    /// A write was attempted inside a read-only transaction.
    #[error("Cannot write in a read-only transaction")]
    ReadOnlyTransaction,

    /// Backend storage failure (lock poisoning, file I/O).
    #[error("Storage error: {0}")]
    Storage(String),

    /// Fjall database error.
    #[error("Fjall error: {0}")]
    Fjall(#[from] fjall::Error),

    /// Serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A requested proof lies outside the tree.
    #[error("Proof out of range: index {index} for tree size {tree_size}")]
    ProofOutOfRange {
        /// Requested leaf index
        index: u64,
        /// Requested snapshot size
        tree_size: u64,
    },

    /// Invalid or malformed proof data.
    #[error("Invalid proof data: {0}")]
    InvalidProof(String),

    /// Key material could not be parsed.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Signing failed.
    #[error("Signing error: {0}")]
    Signing(String),

    /// No head has been persisted for this log yet.
    #[error("No signed head found for log '{0}'")]
    HeadNotFound(String),
}

impl TrustlogError {
    /// Returns true if this error means the key simply does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TrustlogError::ObjectNotFound { .. })
    }
}

impl From<bincode::Error> for TrustlogError {
    fn from(err: bincode::Error) -> Self {
        TrustlogError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for TrustlogError {
    fn from(err: serde_json::Error) -> Self {
        TrustlogError::Serialization(err.to_string())
    }
}

/// Result type alias for trustlog operations.
pub type Result<T> = std::result::Result<T, TrustlogError>;
