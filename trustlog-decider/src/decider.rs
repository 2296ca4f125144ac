//! Decision strategies.
//!
//! Every strategy takes the observations of one round, one per log that
//! reported a value, and either picks a value or explains why it could not.
//!
//! # Strategies
//!
//! - **logid**: trust exactly one log. Confidence 100.
//! - **percentage**: bucket observations by value; a bucket's share is
//!   `100 * count / total`, truncated. Buckets below the minimum are dropped
//!   and the largest survivor wins. Equal shares are broken by the smaller
//!   value, so the result never depends on observation order.
//! - **script**: a user policy, see [`crate::script`]. Confidence 1.
//! - **aggregate**: try strategies in order and return the first decision.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DecisionError, Result};
use crate::script::ScriptDecider;

/// Confidence reported by the logid strategy.
pub const LOG_ID_CONFIDENCE: u32 = 100;

/// One log's answer for a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    /// Reporting log id
    pub source: String,

    /// Reported value (hex digest)
    pub value: String,
}

impl Observation {
    /// Create an observation.
    pub fn new(source: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            value: value.into(),
        }
    }
}

/// The chosen value and how strongly it is backed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOutput {
    /// Chosen value
    pub value: String,

    /// Strategy-specific confidence, 0 to 100
    pub confidence: u32,
}

/// A configured decision strategy.
pub enum Decider {
    /// Trust a single log.
    LogId(String),

    /// Minimum-percentage quorum.
    Percentage {
        /// Share a value needs, in percent
        minimum: u32,
    },

    /// User-supplied policy.
    Script(ScriptDecider),

    /// First success among several strategies.
    Aggregate(Vec<Decider>),
}

impl Decider {
    /// Trust only `log_id`.
    pub fn log_id(log_id: impl Into<String>) -> Self {
        Decider::LogId(log_id.into())
    }

    /// Require at least `minimum` percent agreement.
    pub fn percentage(minimum: u32) -> Result<Self> {
        if minimum > 100 {
            return Err(DecisionError::InvalidConfig(format!(
                "percentage minimum must be at most 100, got {}",
                minimum
            )));
        }
        Ok(Decider::Percentage { minimum })
    }

    /// Compile a policy script.
    pub fn script(source: &str) -> Result<Self> {
        Ok(Decider::Script(ScriptDecider::new(source)?))
    }

    /// Try `deciders` in order.
    pub fn aggregate(deciders: Vec<Decider>) -> Self {
        Decider::Aggregate(deciders)
    }

    /// Strategy name, used in error reports.
    pub fn name(&self) -> &'static str {
        match self {
            Decider::LogId(_) => "logid",
            Decider::Percentage { .. } => "percentage",
            Decider::Script(_) => "script",
            Decider::Aggregate(_) => "aggregate",
        }
    }

    /// Pick a value from `observations`.
    pub fn decide(&self, observations: &[Observation]) -> Result<DecisionOutput> {
        if observations.is_empty() {
            return Err(DecisionError::NoObservations);
        }

        match self {
            Decider::LogId(log_id) => decide_log_id(log_id, observations),
            Decider::Percentage { minimum } => decide_percentage(*minimum, observations),
            Decider::Script(script) => script.decide(observations),
            Decider::Aggregate(deciders) => decide_aggregate(deciders, observations),
        }
    }
}

fn decide_log_id(log_id: &str, observations: &[Observation]) -> Result<DecisionOutput> {
    observations
        .iter()
        .find(|o| o.source == log_id)
        .map(|o| DecisionOutput {
            value: o.value.clone(),
            confidence: LOG_ID_CONFIDENCE,
        })
        .ok_or_else(|| DecisionError::NoMatch(log_id.to_string()))
}

fn decide_percentage(minimum: u32, observations: &[Observation]) -> Result<DecisionOutput> {
    let total = observations.len();

    let mut buckets: BTreeMap<&str, usize> = BTreeMap::new();
    for observation in observations {
        *buckets.entry(observation.value.as_str()).or_default() += 1;
    }

    // Ascending value order; only a strictly larger share replaces the best.
    let mut best: Option<(&str, u32)> = None;
    for (value, count) in buckets {
        let share = (count * 100 / total) as u32;
        debug!("Value {} holds {}% ({}/{})", value, share, count, total);
        if share < minimum {
            continue;
        }
        if best.map_or(true, |(_, best_share)| share > best_share) {
            best = Some((value, share));
        }
    }

    best.map(|(value, share)| DecisionOutput {
        value: value.to_string(),
        confidence: share,
    })
    .ok_or(DecisionError::BelowQuorum { minimum, total })
}

fn decide_aggregate(deciders: &[Decider], observations: &[Observation]) -> Result<DecisionOutput> {
    if deciders.is_empty() {
        return Err(DecisionError::NoStrategies);
    }

    let mut failures = Vec::with_capacity(deciders.len());
    for decider in deciders {
        match decider.decide(observations) {
            Ok(output) => return Ok(output),
            Err(e) => {
                debug!("Strategy {} made no decision: {}", decider.name(), e);
                failures.push((decider.name().to_string(), e));
            }
        }
    }

    Err(DecisionError::Aggregate(failures))
}
