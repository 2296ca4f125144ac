//! Running synchronizers, one per subscribed log.

use std::collections::BTreeMap;

use futures::future::join_all;
use tracing::{info, warn};

use crate::error::{Result, SyncError};
use crate::sync::{sync_once, HeadSynchronizer, Subscription, SyncHandle, SyncOutcome};

/// Owns the [`SyncHandle`] of every subscribed log.
///
/// Pass it around explicitly; there is no process-wide registry.
#[derive(Default)]
pub struct SyncRegistry {
    handles: BTreeMap<String, SyncHandle>,
}

impl SyncRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a synchronizer for `subscription`.
    ///
    /// Fails if that log already has one.
    pub fn subscribe(&mut self, subscription: Subscription) -> Result<()> {
        if self.handles.contains_key(&subscription.log_id) {
            return Err(SyncError::AlreadySubscribed(subscription.log_id));
        }

        info!(
            "Subscribing to '{}' every {:?}",
            subscription.log_id, subscription.poll_interval
        );
        let log_id = subscription.log_id.clone();
        self.handles.insert(log_id, HeadSynchronizer::spawn(subscription));
        Ok(())
    }

    /// Returns true if `log_id` has a running synchronizer.
    pub fn is_subscribed(&self, log_id: &str) -> bool {
        self.handles.contains_key(log_id)
    }

    /// Subscribed log ids.
    pub fn log_ids(&self) -> impl Iterator<Item = &str> {
        self.handles.keys().map(String::as_str)
    }

    /// Stop the synchronizer of `log_id`.
    pub async fn unsubscribe(&mut self, log_id: &str) -> Result<()> {
        match self.handles.remove(log_id) {
            Some(handle) => handle.close().await,
            None => Err(SyncError::UnknownLog(log_id.to_string())),
        }
    }

    /// Stop every synchronizer, waiting for in-flight ticks.
    pub async fn close_all(&mut self) -> Result<()> {
        let handles = std::mem::take(&mut self.handles);
        let results = join_all(handles.into_values().map(SyncHandle::close)).await;

        let mut first_error = None;
        for result in results {
            if let Err(e) = result {
                warn!("{}", e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Run one tick for every subscription in parallel.
///
/// Results come back in subscription order. One log failing never affects the
/// others.
pub async fn sync_round(subscriptions: &[Subscription]) -> Vec<(String, Result<SyncOutcome>)> {
    let ticks = subscriptions.iter().map(|s| async move {
        let outcome = sync_once(
            &s.log_id,
            s.store.as_ref(),
            s.remote.as_ref(),
            s.verifier.as_ref(),
        )
        .await;
        (s.log_id.clone(), outcome)
    });
    join_all(ticks).await
}
