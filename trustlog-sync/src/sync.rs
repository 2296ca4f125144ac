//! Head synchronization.
//!
//! A synchronizer is the only way another party's claims enter local trusted
//! state. Each tick fetches the remote head and passes it through every gate
//! below, in order. A head that fails any gate is dropped and nothing is
//! written; the next tick starts over.
//!
//! 1. **Rollback**: the remote size must not be smaller than the trusted one.
//! 2. **Equality**: at equal sizes the log root, dictionary root and signature
//!    must be byte-identical to the trusted head.
//! 3. **Signature**: the head must verify under the subscribed public key.
//! 4. **Consistency**: the trusted log must be a prefix of the new one.
//! 5. **Persist**: the head replaces the trusted head in one transaction.
//!
//! With no trusted head yet, gates 1 and 2 have nothing to compare against and
//! gate 4 is trivially satisfied from size 0. The signature gate always runs.

use std::sync::Arc;
use std::time::Duration;

use sha2::Sha256;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};
use trustlog_core::proof::valid_consistency_proof;
use trustlog_core::{
    verify_head_signature, HeadVerifier, LogBuckets, SignedHead, Storage, StorageExt,
};

use crate::api::LogApi;
use crate::error::{Result, SyncError};

/// What a successful tick did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// First head accepted for this log.
    Initialized {
        /// Accepted size
        size: u64,
    },
    /// The remote head equals the trusted one.
    Unchanged {
        /// Current size
        size: u64,
    },
    /// The trusted head moved forward.
    Advanced {
        /// Previous size
        from: u64,
        /// New size
        to: u64,
    },
}

/// The last head accepted for `log_id`, if any.
pub fn trusted_head(store: &dyn Storage, log_id: &str) -> Result<Option<SignedHead>> {
    let buckets = LogBuckets::for_log(log_id);
    Ok(store.read(|txn| buckets.find_head(txn))?)
}

fn check_equal(log_id: &str, trusted: &SignedHead, remote: &SignedHead) -> Result<()> {
    let field = if trusted.log_root != remote.log_root {
        "log root"
    } else if trusted.dict_root != remote.dict_root {
        "dictionary root"
    } else if trusted.signature != remote.signature {
        "signature"
    } else {
        return Ok(());
    };

    Err(SyncError::Equivocation {
        log_id: log_id.to_string(),
        size: remote.log_size,
        field,
    })
}

/// Run one synchronization tick for `log_id`.
pub async fn sync_once(
    log_id: &str,
    store: &dyn Storage,
    remote: &dyn LogApi,
    verifier: &dyn HeadVerifier,
) -> Result<SyncOutcome> {
    let trusted = trusted_head(store, log_id)?;
    let head = remote.get_head().await?;

    if let Some(trusted) = &trusted {
        if head.log_size < trusted.log_size {
            return Err(SyncError::Rollback {
                log_id: log_id.to_string(),
                trusted: trusted.log_size,
                remote: head.log_size,
            });
        }
        if head.log_size == trusted.log_size {
            check_equal(log_id, trusted, &head)?;
        }
    }

    if !verify_head_signature::<Sha256>(verifier, &head) {
        return Err(SyncError::InvalidSignature(log_id.to_string()));
    }

    let (from, from_root) = match &trusted {
        Some(trusted) => (trusted.log_size, trusted.log_root.clone()),
        None => (0, Vec::new()),
    };

    if from == head.log_size && trusted.is_some() {
        debug!("Log '{}' unchanged at size {}", log_id, from);
        return Ok(SyncOutcome::Unchanged { size: from });
    }

    if from > 0 {
        let proof = remote.get_consistency_proof(from, head.log_size).await?;
        if !valid_consistency_proof::<Sha256>(&from_root, &head.log_root, from, head.log_size, &proof)
        {
            return Err(SyncError::InvalidConsistencyProof {
                log_id: log_id.to_string(),
                from,
                to: head.log_size,
            });
        }
    }

    let buckets = LogBuckets::for_log(log_id);
    store.write(|txn| buckets.put_head(txn, &head))?;

    info!("Updated head of '{}' from size {} to {}", log_id, from, head.log_size);

    Ok(match trusted {
        None => SyncOutcome::Initialized {
            size: head.log_size,
        },
        Some(_) => SyncOutcome::Advanced {
            from,
            to: head.log_size,
        },
    })
}

/// Everything a synchronizer needs to follow one remote log.
#[derive(Clone)]
pub struct Subscription {
    /// Log id
    pub log_id: String,
    /// Where trusted heads are persisted
    pub store: Arc<dyn Storage>,
    /// The remote log
    pub remote: Arc<dyn LogApi>,
    /// The log's public key
    pub verifier: Arc<dyn HeadVerifier>,
    /// Time between ticks
    pub poll_interval: Duration,
}

impl Subscription {
    /// Run one tick, logging instead of returning a rejection.
    pub async fn tick(&self) -> Option<SyncOutcome> {
        match sync_once(
            &self.log_id,
            self.store.as_ref(),
            self.remote.as_ref(),
            self.verifier.as_ref(),
        )
        .await
        {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("Could not update head of '{}': {}", self.log_id, e);
                None
            }
        }
    }
}

/// Background task following one remote log.
pub struct HeadSynchronizer;

impl HeadSynchronizer {
    /// Start following `subscription`: one tick right away, then one per
    /// poll interval until the returned handle is closed.
    pub fn spawn(subscription: Subscription) -> SyncHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let log_id = subscription.log_id.clone();

        let task = tokio::spawn(async move {
            subscription.tick().await;

            let period = subscription.poll_interval.max(Duration::from_millis(1));
            let mut timer = interval_at(Instant::now() + period, period);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => {
                        debug!("Synchronizer for '{}' shutting down", subscription.log_id);
                        return;
                    }
                    _ = timer.tick() => {
                        // The tick runs in the arm body so shutdown never
                        // interrupts it.
                        subscription.tick().await;
                    }
                }
            }
        });

        SyncHandle {
            log_id,
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// Handle to a running [`HeadSynchronizer`].
pub struct SyncHandle {
    log_id: String,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Id of the followed log.
    pub fn log_id(&self) -> &str {
        &self.log_id
    }

    /// Stop after the in-flight tick, if any, and wait for the task to end.
    pub async fn close(mut self) -> Result<()> {
        if let Some(shutdown) = self.shutdown.take() {
            // The task may already be gone; joining below reports why.
            let _ = shutdown.send(());
        }
        self.task
            .await
            .map_err(|e| SyncError::Task(format!("{}: {}", self.log_id, e)))
    }
}
