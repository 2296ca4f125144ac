//! Error types for log access and head synchronization.

use thiserror::Error;

/// Errors that can occur while talking to a log or accepting its heads.
///
/// Every variant except [`SyncError::Core`] is specific to one tick: the tick
/// is abandoned, nothing is persisted and the next tick starts over.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote head is smaller than the trusted one.
    #[error("Log '{log_id}' refuses to go back in time: trusted size {trusted}, remote size {remote}")]
    Rollback {
        /// Log id
        log_id: String,
        /// Size of the trusted head
        trusted: u64,
        /// Size of the fetched head
        remote: u64,
    },

    /// Two different heads were presented for the same size.
    #[error("Log '{log_id}' equivocated at size {size}: {field} mismatch")]
    Equivocation {
        /// Log id
        log_id: String,
        /// Shared tree size
        size: u64,
        /// First differing field
        field: &'static str,
    },

    /// The head signature does not verify under the log's public key.
    #[error("Invalid head signature from log '{0}'")]
    InvalidSignature(String),

    /// The consistency proof between the trusted and the new head failed.
    #[error("Invalid consistency proof from log '{log_id}' for sizes {from} -> {to}")]
    InvalidConsistencyProof {
        /// Log id
        log_id: String,
        /// Trusted size
        from: u64,
        /// New size
        to: u64,
    },

    /// The remote could not be reached or answered with an error.
    #[error("Remote error: {0}")]
    Remote(String),

    /// The log id is not known.
    #[error("Unknown log '{0}'")]
    UnknownLog(String),

    /// A synchronizer for this log is already running.
    #[error("Log '{0}' is already subscribed")]
    AlreadySubscribed(String),

    /// A background task panicked or was aborted.
    #[error("Synchronizer task failed: {0}")]
    Task(String),

    /// Error from trustlog-core.
    #[error("Core error: {0}")]
    Core(#[from] trustlog_core::TrustlogError),
}

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
