//! Signed heads.
//!
//! A [`SignedHead`] binds the state of one log into a single signature: the
//! verifiable log, the authenticated dictionary and the map-head log, which
//! records every dictionary root the log has ever published.
//!
//! # Signed Digest
//!
//! ```text
//! H(log_root || u64le(log_size) || dict_root || map_head_root || u64le(map_head_size))
//! ```
//!
//! Field order and encoding are fixed; any other encoding fails verification
//! against independent implementations.

use serde::{Deserialize, Serialize};
use sha2::Digest;

use crate::dictionary::AuthenticatedDictionary;
use crate::error::{Result, TrustlogError};
use crate::hash::Hash;
use crate::log::VerifiableLog;
use crate::signer::{HeadSigner, HeadVerifier};
use crate::storage::{Bucket, BucketTransaction, Transaction};

const HEAD_KEY: &[u8] = b"HEAD";

/// A signed snapshot of a log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedHead {
    /// Verifiable log root
    pub log_root: Hash,

    /// Verifiable log size
    pub log_size: u64,

    /// Authenticated dictionary root
    pub dict_root: Hash,

    /// Map-head log root
    pub map_head_root: Hash,

    /// Map-head log size
    pub map_head_size: u64,

    /// Signature over [`head_digest`]
    pub signature: Vec<u8>,
}

impl SignedHead {
    /// The digest covered by `signature`.
    pub fn digest<D: Digest>(&self) -> Hash {
        head_digest::<D>(
            &self.log_root,
            self.log_size,
            &self.dict_root,
            &self.map_head_root,
            self.map_head_size,
        )
    }

    /// Serialize with bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Deserialize from bincode.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// Compute the signed digest of a head.
pub fn head_digest<D: Digest>(
    log_root: &[u8],
    log_size: u64,
    dict_root: &[u8],
    map_head_root: &[u8],
    map_head_size: u64,
) -> Hash {
    let mut hasher = D::new();
    hasher.update(log_root);
    hasher.update(log_size.to_le_bytes());
    hasher.update(dict_root);
    hasher.update(map_head_root);
    hasher.update(map_head_size.to_le_bytes());
    hasher.finalize().to_vec()
}

/// Record the dictionary root in the map-head log and sign the combined state.
pub fn sign_head<D: Digest>(
    log: &VerifiableLog<'_, D>,
    dict: &impl AuthenticatedDictionary,
    map_head_log: &mut VerifiableLog<'_, D>,
    signer: &dyn HeadSigner,
) -> Result<SignedHead> {
    let dict_root = dict.root();
    map_head_log.append(&dict_root)?;

    let log_root = log.root()?;
    let log_size = log.size();
    let map_head_root = map_head_log.root()?;
    let map_head_size = map_head_log.size();

    let digest = head_digest::<D>(&log_root, log_size, &dict_root, &map_head_root, map_head_size);
    let signature = signer.sign(&digest)?;

    Ok(SignedHead {
        log_root,
        log_size,
        dict_root,
        map_head_root,
        map_head_size,
        signature,
    })
}

/// Returns true if `head.signature` is valid under `verifier`.
pub fn verify_head_signature<D: Digest>(verifier: &dyn HeadVerifier, head: &SignedHead) -> bool {
    verifier.verify(&head.digest::<D>(), &head.signature)
}

/// Storage layout of one log.
///
/// ```text
/// log/{id}/HEAD
/// log/{id}/vlog/{level}-{index}
/// log/{id}/maplog/{level}-{index}
/// log/{id}/map/nodes/{hash}
/// log/{id}/map/values/{hash}
/// ```
#[derive(Debug, Clone)]
pub struct LogBuckets {
    log_id: String,
    root: Bucket,
}

impl LogBuckets {
    /// Buckets for the log named `log_id`.
    pub fn for_log(log_id: &str) -> Self {
        Self {
            log_id: log_id.to_string(),
            root: Bucket::new("log").cd(log_id),
        }
    }

    /// The log id.
    pub fn log_id(&self) -> &str {
        &self.log_id
    }

    /// Bucket holding the current head.
    pub fn root(&self) -> &Bucket {
        &self.root
    }

    /// Verifiable log nodes.
    pub fn vlog(&self) -> Bucket {
        self.root.cd("vlog")
    }

    /// Map-head log nodes.
    pub fn map_log(&self) -> Bucket {
        self.root.cd("maplog")
    }

    /// Dictionary nodes.
    pub fn map_nodes(&self) -> Bucket {
        self.root.cd("map").cd("nodes")
    }

    /// Dictionary values.
    pub fn map_values(&self) -> Bucket {
        self.root.cd("map").cd("values")
    }

    fn head_txn<'t>(&self, txn: &'t dyn Transaction) -> BucketTransaction<'t> {
        self.root.txn(txn)
    }

    /// Load the current head, failing with [`TrustlogError::HeadNotFound`].
    pub fn get_head(&self, txn: &dyn Transaction) -> Result<SignedHead> {
        match self.find_head(txn)? {
            Some(head) => Ok(head),
            None => Err(TrustlogError::HeadNotFound(self.log_id.clone())),
        }
    }

    /// Load the current head, if any.
    pub fn find_head(&self, txn: &dyn Transaction) -> Result<Option<SignedHead>> {
        match self.head_txn(txn).get_opt(HEAD_KEY)? {
            Some(bytes) => Ok(Some(SignedHead::from_bytes(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Replace the current head.
    pub fn put_head(&self, txn: &dyn Transaction, head: &SignedHead) -> Result<()> {
        self.head_txn(txn).set(HEAD_KEY, &head.to_bytes()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dictionary::SparseMerkleMap;
    use crate::signer::Ed25519Signer;
    use crate::storage::{MemoryStorage, StorageExt};
    use sha2::Sha256;

    #[test]
    fn test_digest_layout() {
        let mut hasher = Sha256::new();
        hasher.update([1u8; 32]);
        hasher.update([5, 0, 0, 0, 0, 0, 0, 0]);
        hasher.update([2u8; 32]);
        hasher.update([3u8; 32]);
        hasher.update([1, 1, 0, 0, 0, 0, 0, 0]);
        let expected = hasher.finalize().to_vec();

        assert_eq!(
            head_digest::<Sha256>(&[1u8; 32], 5, &[2u8; 32], &[3u8; 32], 257),
            expected
        );
    }

    #[test]
    fn test_sign_head_records_dict_root() {
        let store = MemoryStorage::new();
        let buckets = LogBuckets::for_log("test");
        let signer = Ed25519Signer::from_seed(&[9u8; 32]).unwrap();

        let head = store
            .write(|txn| {
                let mut log: VerifiableLog = VerifiableLog::new(buckets.vlog().txn(txn), 0);
                let mut map_log: VerifiableLog = VerifiableLog::new(buckets.map_log().txn(txn), 0);
                let mut map: SparseMerkleMap =
                    SparseMerkleMap::new(buckets.map_nodes().txn(txn), buckets.map_values().txn(txn));

                log.append_kv(b"k", b"v")?;
                map.update(b"k", b"v")?;

                let head = sign_head(&log, &map, &mut map_log, &signer)?;
                assert_eq!(map_log.leaf(0)?.leaf_digest, crate::hash::leaf_digest::<Sha256>(&map.root()));
                Ok(head)
            })
            .unwrap();

        assert_eq!(head.log_size, 1);
        assert_eq!(head.map_head_size, 1);
        assert!(verify_head_signature::<Sha256>(&signer.verifier(), &head));

        let mut tampered = head.clone();
        tampered.log_size = 2;
        assert!(!verify_head_signature::<Sha256>(&signer.verifier(), &tampered));
    }

    #[test]
    fn test_head_persistence() {
        let store = MemoryStorage::new();
        let buckets = LogBuckets::for_log("persist");

        let missing = store.read(|txn| buckets.get_head(txn)).unwrap_err();
        assert!(matches!(missing, TrustlogError::HeadNotFound(id) if id == "persist"));

        let head = SignedHead {
            log_root: vec![1; 32],
            log_size: 3,
            dict_root: vec![2; 32],
            map_head_root: vec![3; 32],
            map_head_size: 2,
            signature: vec![4; 64],
        };
        store.write(|txn| buckets.put_head(txn, &head)).unwrap();

        let loaded = store.read(|txn| buckets.get_head(txn)).unwrap();
        assert_eq!(loaded, head);
    }

    #[test]
    fn test_bucket_layout() {
        let buckets = LogBuckets::for_log("abc");
        assert_eq!(buckets.root().join(), "log/abc");
        assert_eq!(buckets.vlog().join(), "log/abc/vlog");
        assert_eq!(buckets.map_log().join(), "log/abc/maplog");
        assert_eq!(buckets.map_nodes().join(), "log/abc/map/nodes");
        assert_eq!(buckets.map_values().join(), "log/abc/map/values");
    }
}
