//! Error types for decisions.

use thiserror::Error;

/// Reasons a decision could not be made.
///
/// Everything except [`DecisionError::Sync`] and [`DecisionError::Core`] is a
/// "no decision" outcome: the inputs were fine, the policy just did not pick
/// a value.
#[derive(Debug, Error)]
pub enum DecisionError {
    /// Nothing to decide on.
    #[error("No observations to decide on")]
    NoObservations,

    /// An aggregate decider has no strategies.
    #[error("No decision strategies configured")]
    NoStrategies,

    /// The configured log did not report a value.
    #[error("Could not find any match for log '{0}'")]
    NoMatch(String),

    /// No value reached the minimum share.
    #[error("No value reached {minimum}% of {total} observations")]
    BelowQuorum {
        /// Required percentage
        minimum: u32,
        /// Number of observations
        total: usize,
    },

    /// The policy script failed or returned something unusable.
    #[error("Script error: {0}")]
    Script(String),

    /// Every strategy of an aggregate failed.
    #[error("Encountered errors while deciding: {}", describe_failures(.0))]
    Aggregate(Vec<(String, DecisionError)>),

    /// A decider configuration is invalid.
    #[error("Invalid decider configuration: {0}")]
    InvalidConfig(String),

    /// Error from trustlog-sync.
    #[error("Sync error: {0}")]
    Sync(#[from] trustlog_sync::SyncError),

    /// Error from trustlog-core.
    #[error("Core error: {0}")]
    Core(#[from] trustlog_core::TrustlogError),
}

fn describe_failures(failures: &[(String, DecisionError)]) -> String {
    failures
        .iter()
        .map(|(name, err)| format!("{}: {}", name, err))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias for decisions.
pub type Result<T> = std::result::Result<T, DecisionError>;
