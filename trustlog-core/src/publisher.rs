//! Single-writer publisher.
//!
//! The publisher is the only code path that mutates a log. Each batch runs
//! under the publisher lock and inside one storage update, so a batch either
//! lands completely, with a freshly signed head, or not at all.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, error, info};

use crate::dictionary::{AuthenticatedDictionary, SparseMerkleMap};
use crate::error::{Result, TrustlogError};
use crate::hash::{digest, Hash};
use crate::head::{sign_head, LogBuckets, SignedHead};
use crate::log::VerifiableLog;
use crate::signer::HeadSigner;
use crate::storage::{Storage, StorageExt, Transaction};

/// A key/value pair submitted for publication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValuePair {
    /// Lookup key
    pub key: Vec<u8>,

    /// Value; only its digest is committed to the log
    pub value: Vec<u8>,
}

impl KeyValuePair {
    /// Create a pair.
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Dictionary value stored for every published key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapEntry {
    /// `H(value)`
    #[serde(with = "hex::serde")]
    pub digest: Hash,

    /// Index of the corresponding leaf in the verifiable log
    pub index: u64,
}

impl MapEntry {
    /// Encode as JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode from JSON.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Writes key/value batches into one log and signs its heads.
pub struct Publisher {
    buckets: LogBuckets,
    store: Arc<dyn Storage>,
    signer: Arc<dyn HeadSigner>,
    lock: Mutex<()>,
}

impl Publisher {
    /// Open the publisher for `log_id`, signing an initial empty head if the
    /// log has none yet.
    pub fn new(log_id: &str, store: Arc<dyn Storage>, signer: Arc<dyn HeadSigner>) -> Result<Self> {
        let publisher = Self {
            buckets: LogBuckets::for_log(log_id),
            store,
            signer,
            lock: Mutex::new(()),
        };
        publisher.ensure_head()?;
        Ok(publisher)
    }

    /// The log id.
    pub fn log_id(&self) -> &str {
        self.buckets.log_id()
    }

    /// The current signed head.
    pub fn head(&self) -> Result<SignedHead> {
        self.store.read(|txn| self.buckets.get_head(txn))
    }

    fn ensure_head(&self) -> Result<()> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| TrustlogError::Storage(format!("publisher lock poisoned: {}", e)))?;

        self.store.write(|txn| {
            if self.buckets.find_head(txn)?.is_some() {
                return Ok(());
            }

            let log: VerifiableLog = VerifiableLog::new(self.buckets.vlog().txn(txn), 0);
            let mut map_log: VerifiableLog = VerifiableLog::new(self.buckets.map_log().txn(txn), 0);
            let map: SparseMerkleMap = SparseMerkleMap::new(
                self.buckets.map_nodes().txn(txn),
                self.buckets.map_values().txn(txn),
            );

            let head = sign_head(&log, &map, &mut map_log, self.signer.as_ref())?;
            self.buckets.put_head(txn, &head)?;
            info!("Initialized log '{}' with an empty signed head", self.log_id());
            Ok(())
        })
    }

    /// Publish a batch and return the resulting head.
    ///
    /// Keys already present with the same value are skipped. Keys present with
    /// a different value are logged and skipped: published entries are never
    /// rewritten. If nothing new was written the head is left unchanged.
    pub fn publish(&self, items: &[KeyValuePair]) -> Result<SignedHead> {
        let _guard = self
            .lock
            .lock()
            .map_err(|e| TrustlogError::Storage(format!("publisher lock poisoned: {}", e)))?;

        self.store.write(|txn| self.write_items(txn, items))
    }

    fn write_items(&self, txn: &dyn Transaction, items: &[KeyValuePair]) -> Result<SignedHead> {
        let head = self.buckets.get_head(txn)?;

        debug!("Opening log '{}' at size {}", self.log_id(), head.log_size);
        let mut log: VerifiableLog = VerifiableLog::new(self.buckets.vlog().txn(txn), head.log_size);
        let mut map_log: VerifiableLog =
            VerifiableLog::new(self.buckets.map_log().txn(txn), head.map_head_size);
        let mut map: SparseMerkleMap = SparseMerkleMap::import(
            self.buckets.map_nodes().txn(txn),
            self.buckets.map_values().txn(txn),
            head.dict_root.clone(),
        );

        for pair in items {
            let value_digest = digest::<Sha256>(&pair.value);

            if let Some(existing) = map.get(&pair.key)? {
                let existing = MapEntry::from_json(&existing)?;
                if existing.digest == value_digest {
                    debug!("Key {} already published, skipping", hex::encode(&pair.key));
                } else {
                    error!(
                        "Key {} already exists in log '{}' with a different value",
                        hex::encode(&pair.key),
                        self.log_id()
                    );
                }
                continue;
            }

            log.append_kv(&pair.key, &pair.value)?;
            let entry = MapEntry {
                digest: value_digest,
                index: log.size() - 1,
            };
            map.update(&pair.key, &entry.to_json()?)?;
        }

        if log.size() == head.log_size {
            debug!("Nothing written to '{}', keeping head at size {}", self.log_id(), head.log_size);
            return Ok(head);
        }

        let next = sign_head(&log, &map, &mut map_log, self.signer.as_ref())?;
        self.buckets.put_head(txn, &next)?;
        info!(
            "Published {} entries to '{}', new size {}",
            next.log_size - head.log_size,
            self.log_id(),
            next.log_size
        );

        Ok(next)
    }
}
