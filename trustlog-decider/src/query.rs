//! Deciding a key across every known log.
//!
//! Each log is queried in parallel at the head this node last accepted for
//! it. A log whose answer cannot be verified is recorded as a miss for this
//! round and the decision proceeds with the others.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, info, warn};
use trustlog_core::{AuthenticatedDictionary, MapEntry, SparseMerkleMap, Storage, TrustlogError};
use trustlog_sync::{trusted_head, LogApi, LogRegistry};

use crate::decider::{DecisionOutput, Decider, Observation};
use crate::error::Result;

/// A log that did not contribute an observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Miss {
    /// Log id
    pub log_id: String,

    /// Why no observation was produced
    pub reason: String,
}

/// Result of [`decide_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDecision {
    /// The decision
    pub decision: DecisionOutput,

    /// Logs that reported the chosen value
    pub sources: Vec<String>,

    /// Every observation collected this round
    pub observations: Vec<Observation>,

    /// Logs that could not be used this round
    pub misses: Vec<Miss>,
}

/// Query one log for `key` at its trusted head.
///
/// `Ok(None)` means the log proved the key absent.
pub async fn observe(
    key: &[u8],
    log_id: &str,
    api: &dyn LogApi,
    store: &dyn Storage,
) -> Result<Option<Observation>> {
    let head = trusted_head(store, log_id)?
        .ok_or_else(|| TrustlogError::HeadNotFound(log_id.to_string()))?;

    let answer = api.get_map_value(key, &head.dict_root).await?;
    if !SparseMerkleMap::<Sha256>::verify_compact(&answer.proof, &head.dict_root, key, &answer.value) {
        return Err(TrustlogError::InvalidProof(format!(
            "map proof from log '{}' does not match its trusted head",
            log_id
        ))
        .into());
    }

    if answer.value.is_empty() {
        return Ok(None);
    }

    let entry = MapEntry::from_json(&answer.value)?;
    Ok(Some(Observation::new(log_id, hex::encode(entry.digest))))
}

/// Decide `key` across all logs in `logs`, using the trusted heads in `store`.
pub async fn decide_key(
    key: &[u8],
    logs: &LogRegistry,
    store: &dyn Storage,
    decider: &Decider,
) -> Result<KeyDecision> {
    let queries = logs.iter().map(|(log_id, api)| async move {
        (log_id, observe(key, log_id, api.as_ref(), store).await)
    });

    let mut observations = Vec::new();
    let mut misses = Vec::new();
    for (log_id, result) in join_all(queries).await {
        match result {
            Ok(Some(observation)) => {
                debug!("Log '{}' reports {}", log_id, observation.value);
                observations.push(observation);
            }
            Ok(None) => misses.push(Miss {
                log_id: log_id.to_string(),
                reason: "key not present".to_string(),
            }),
            Err(e) => {
                warn!("Skipping log '{}' this round: {}", log_id, e);
                misses.push(Miss {
                    log_id: log_id.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    let decision = decider.decide(&observations)?;
    let sources = observations
        .iter()
        .filter(|o| o.value == decision.value)
        .map(|o| o.source.clone())
        .collect();

    info!(
        "Decided {} with confidence {} using {}",
        decision.value,
        decision.confidence,
        decider.name()
    );

    Ok(KeyDecision {
        decision,
        sources,
        observations,
        misses,
    })
}
