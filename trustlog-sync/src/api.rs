//! Read-only access to a log, local or remote.
//!
//! [`LogApi`] is the seam between verification logic and transport: the
//! synchronizer and the decision fan-out only ever see this trait.
//! [`LocalLogApi`] serves it straight from a [`Storage`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use trustlog_core::{
    AuthenticatedDictionary, CompactProof, Hash, LogBuckets, LogLeaf, SignedHead,
    SparseMerkleMap, Storage, StorageExt, TrustlogError, VerifiableLog,
};

use crate::error::{Result, SyncError};

/// A dictionary value with its proof. An empty `value` means "absent".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MapValue {
    /// Stored value, empty if the key is absent
    pub value: Vec<u8>,

    /// Membership or non-membership proof against the requested root
    pub proof: CompactProof,
}

/// Read-only operations a log serves to other parties.
#[async_trait]
pub trait LogApi: Send + Sync {
    /// Id of the log behind this handle.
    fn log_id(&self) -> &str;

    /// Current signed head.
    async fn get_head(&self) -> Result<SignedHead>;

    /// Consistency proof of the log between two sizes.
    async fn get_consistency_proof(&self, first: u64, second: u64) -> Result<Vec<Hash>>;

    /// Audit proof of leaf `index` at `size`.
    async fn get_audit_proof(&self, index: u64, size: u64) -> Result<Vec<Hash>>;

    /// Leaves `start..finish`.
    async fn get_log_entries(&self, start: u64, finish: u64) -> Result<Vec<LogLeaf>>;

    /// Dictionary value for `key` at `dict_root`, with a compact proof.
    async fn get_map_value(&self, key: &[u8], dict_root: &[u8]) -> Result<MapValue>;

    /// Consistency proof of the map-head log between two sizes.
    async fn get_map_head_consistency_proof(&self, first: u64, second: u64) -> Result<Vec<Hash>>;
}

/// [`LogApi`] backed by a local store.
pub struct LocalLogApi {
    buckets: LogBuckets,
    store: Arc<dyn Storage>,
}

impl LocalLogApi {
    /// Serve `log_id` from `store`.
    pub fn new(log_id: &str, store: Arc<dyn Storage>) -> Self {
        Self {
            buckets: LogBuckets::for_log(log_id),
            store,
        }
    }

    fn head(&self) -> Result<SignedHead> {
        Ok(self.store.read(|txn| self.buckets.get_head(txn))?)
    }
}

#[async_trait]
impl LogApi for LocalLogApi {
    fn log_id(&self) -> &str {
        self.buckets.log_id()
    }

    async fn get_head(&self) -> Result<SignedHead> {
        self.head()
    }

    async fn get_consistency_proof(&self, first: u64, second: u64) -> Result<Vec<Hash>> {
        let head = self.head()?;
        let proof = self.store.read(|txn| {
            let log: VerifiableLog = VerifiableLog::new(self.buckets.vlog().txn(txn), head.log_size);
            log.consistency_proof(first, second)
        })?;
        Ok(proof)
    }

    async fn get_audit_proof(&self, index: u64, size: u64) -> Result<Vec<Hash>> {
        let head = self.head()?;
        let proof = self.store.read(|txn| {
            let log: VerifiableLog = VerifiableLog::new(self.buckets.vlog().txn(txn), head.log_size);
            log.audit_proof(index, size)
        })?;
        Ok(proof)
    }

    async fn get_log_entries(&self, start: u64, finish: u64) -> Result<Vec<LogLeaf>> {
        let head = self.head()?;
        if start > finish || finish > head.log_size {
            return Err(TrustlogError::ProofOutOfRange {
                index: finish,
                tree_size: head.log_size,
            }
            .into());
        }

        let leaves: Vec<LogLeaf> = self.store.read(|txn| {
            let log: VerifiableLog = VerifiableLog::new(self.buckets.vlog().txn(txn), head.log_size);
            (start..finish).map(|i| log.leaf(i)).collect()
        })?;
        Ok(leaves)
    }

    async fn get_map_value(&self, key: &[u8], dict_root: &[u8]) -> Result<MapValue> {
        let value = self.store.read(|txn| {
            let map: SparseMerkleMap = SparseMerkleMap::import(
                self.buckets.map_nodes().txn(txn),
                self.buckets.map_values().txn(txn),
                dict_root.to_vec(),
            );
            Ok(MapValue {
                value: map.get(key)?.unwrap_or_default(),
                proof: map.prove_compact(key)?,
            })
        })?;
        Ok(value)
    }

    async fn get_map_head_consistency_proof(&self, first: u64, second: u64) -> Result<Vec<Hash>> {
        let head = self.head()?;
        let proof = self.store.read(|txn| {
            let log: VerifiableLog =
                VerifiableLog::new(self.buckets.map_log().txn(txn), head.map_head_size);
            log.consistency_proof(first, second)
        })?;
        Ok(proof)
    }
}

/// Named [`LogApi`] handles, in a stable order.
#[derive(Default, Clone)]
pub struct LogRegistry {
    logs: BTreeMap<String, Arc<dyn LogApi>>,
}

impl LogRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `api` under its log id, replacing any previous handle.
    pub fn insert(&mut self, api: Arc<dyn LogApi>) {
        self.logs.insert(api.log_id().to_string(), api);
    }

    /// Look up a log.
    pub fn get(&self, log_id: &str) -> Result<Arc<dyn LogApi>> {
        self.logs
            .get(log_id)
            .cloned()
            .ok_or_else(|| SyncError::UnknownLog(log_id.to_string()))
    }

    /// Registered log ids.
    pub fn log_ids(&self) -> impl Iterator<Item = &str> {
        self.logs.keys().map(String::as_str)
    }

    /// All registered handles.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn LogApi>)> {
        self.logs.iter().map(|(id, api)| (id.as_str(), api))
    }

    /// Number of registered logs.
    pub fn len(&self) -> usize {
        self.logs.len()
    }

    /// Returns true if no log is registered.
    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Sha256;
    use trustlog_core::proof::root_from_audit_proof;
    use trustlog_core::{Ed25519Signer, KeyValuePair, MemoryStorage, Publisher};

    fn published() -> LocalLogApi {
        let store: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let signer = Arc::new(Ed25519Signer::from_seed(&[5u8; 32]).unwrap());
        let publisher = Publisher::new("local", store.clone(), signer).unwrap();
        publisher
            .publish(&[
                KeyValuePair::new("a", "1"),
                KeyValuePair::new("b", "2"),
                KeyValuePair::new("c", "3"),
            ])
            .unwrap();
        LocalLogApi::new("local", store)
    }

    #[tokio::test]
    async fn test_head_and_entries() {
        let api = published();
        let head = api.get_head().await.unwrap();
        assert_eq!(head.log_size, 3);

        let entries = api.get_log_entries(0, 3).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].key.as_deref(), Some(&b"b"[..]));

        assert!(api.get_log_entries(2, 4).await.is_err());
    }

    #[tokio::test]
    async fn test_audit_proof_verifies() {
        let api = published();
        let head = api.get_head().await.unwrap();
        let entries = api.get_log_entries(0, 3).await.unwrap();

        for (i, entry) in entries.iter().enumerate() {
            let proof = api.get_audit_proof(i as u64, 3).await.unwrap();
            let root = root_from_audit_proof::<Sha256>(&entry.leaf_digest, &proof, i as u64, 3)
                .unwrap();
            assert_eq!(root, head.log_root);
        }
    }

    #[tokio::test]
    async fn test_map_value_proofs() {
        let api = published();
        let head = api.get_head().await.unwrap();

        let present = api.get_map_value(b"b", &head.dict_root).await.unwrap();
        assert!(!present.value.is_empty());
        assert!(SparseMerkleMap::<Sha256>::verify_compact(
            &present.proof,
            &head.dict_root,
            b"b",
            &present.value
        ));

        let absent = api.get_map_value(b"zz", &head.dict_root).await.unwrap();
        assert!(absent.value.is_empty());
        assert!(SparseMerkleMap::<Sha256>::verify_compact(
            &absent.proof,
            &head.dict_root,
            b"zz",
            b""
        ));
    }

    #[test]
    fn test_registry_lookup() {
        let mut registry = LogRegistry::new();
        registry.insert(Arc::new(published()));

        assert_eq!(registry.len(), 1);
        assert!(registry.get("local").is_ok());
        assert!(matches!(registry.get("other"), Err(SyncError::UnknownLog(_))));
        assert_eq!(registry.log_ids().collect::<Vec<_>>(), vec!["local"]);
    }
}
