//! Decider configuration.
//!
//! Strategies are declared as a list of tables tagged by `engine`:
//!
//! ```toml
//! [[decider]]
//! engine = "logid"
//! log_id = "upstream"
//!
//! [[decider]]
//! engine = "percentage"
//! minimum = 60
//! ```
//!
//! One entry builds that strategy alone; several build an aggregate that
//! tries them in declaration order.

use serde::{Deserialize, Serialize};

use crate::decider::Decider;
use crate::error::{DecisionError, Result};

/// One configured strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "engine", rename_all = "lowercase")]
pub enum DeciderConfig {
    /// Trust one log.
    LogId {
        /// Log id
        log_id: String,
    },
    /// Minimum-percentage quorum.
    Percentage {
        /// Share a value needs, in percent
        minimum: u32,
    },
    /// Scripted policy.
    Script {
        /// Script source defining `fn decide(observations)`
        script: String,
    },
}

impl DeciderConfig {
    /// Build and validate this strategy.
    pub fn build(&self) -> Result<Decider> {
        match self {
            DeciderConfig::LogId { log_id } => {
                if log_id.is_empty() {
                    return Err(DecisionError::InvalidConfig(
                        "logid strategy needs a log_id".to_string(),
                    ));
                }
                Ok(Decider::log_id(log_id.clone()))
            }
            DeciderConfig::Percentage { minimum } => Decider::percentage(*minimum),
            DeciderConfig::Script { script } => Decider::script(script),
        }
    }
}

/// Build the decider for an ordered list of strategies.
pub fn build_decider(configs: &[DeciderConfig]) -> Result<Decider> {
    match configs {
        [] => Err(DecisionError::NoStrategies),
        [single] => single.build(),
        many => Ok(Decider::aggregate(
            many.iter().map(DeciderConfig::build).collect::<Result<_>>()?,
        )),
    }
}
