//! Append-only verifiable log.
//!
//! A [`VerifiableLog`] is a binary Merkle tree stored level by level: every
//! complete node lives at `"{level}-{index}"` in the log bucket. Appending a
//! leaf writes it at level 0 and folds upward as long as a level's node count
//! becomes even, so each node is computed exactly once.
//!
//! The root and all proofs are read from stored nodes, never recomputed from
//! the leaves.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, TrustlogError};
use crate::hash::{
    branch_hash, digest, empty_root, is_right_child, leaf_digest, leaf_digest_kv, level_size,
    parent, root_size, Hash,
};
use crate::storage::BucketTransaction;

/// A stored tree node.
///
/// Level-0 nodes appended with [`VerifiableLog::append_kv`] also retain the
/// key and the digest of the value. Branch nodes only carry `leaf_digest`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogLeaf {
    /// Raw key, for key/value leaves
    pub key: Option<Vec<u8>>,

    /// `H(value)`, for key/value leaves
    pub value_digest: Option<Hash>,

    /// Node digest
    pub leaf_digest: Hash,
}

impl LogLeaf {
    fn branch(digest: Hash) -> Self {
        Self {
            key: None,
            value_digest: None,
            leaf_digest: digest,
        }
    }
}

/// Node storage keyed by `(level, index)`.
pub struct LogStorage<'t> {
    txn: BucketTransaction<'t>,
}

impl<'t> LogStorage<'t> {
    /// Wrap a bucket-scoped transaction.
    pub fn new(txn: BucketTransaction<'t>) -> Self {
        Self { txn }
    }

    fn node_key(level: usize, index: u64) -> String {
        format!("{}-{}", level, index)
    }

    /// Read the node at `(level, index)`.
    ///
    /// A miss is a structural error: the node must exist for the current size.
    pub fn get(&self, level: usize, index: u64) -> Result<LogLeaf> {
        let bytes = match self.txn.get(Self::node_key(level, index).as_bytes()) {
            Ok(bytes) => bytes,
            Err(e) if e.is_not_found() => return Err(TrustlogError::MissingNode { level, index }),
            Err(e) => return Err(e),
        };
        Ok(bincode::deserialize(&bytes)?)
    }

    /// Store `leaf` as the last node of `level` for a tree of `tree_size`.
    pub fn append(&self, tree_size: u64, level: usize, leaf: &LogLeaf) -> Result<()> {
        let index = level_size(tree_size, level)
            .checked_sub(1)
            .ok_or(TrustlogError::MissingNode { level, index: 0 })?;
        let bytes = bincode::serialize(leaf)?;
        self.txn.set(Self::node_key(level, index).as_bytes(), &bytes)
    }
}

/// An append-only Merkle log over a transaction.
///
/// The log borrows the transaction it was opened in; its size is supplied by
/// the caller (normally from the last signed head) and advances on append.
///
/// # Example
///
/// ```rust
/// use trustlog_core::{Bucket, MemoryStorage, StorageExt, VerifiableLog};
///
/// let store = MemoryStorage::new();
/// let bucket = Bucket::new("log");
///
/// let root = store
///     .write(|txn| {
///         let mut log: VerifiableLog = VerifiableLog::new(bucket.txn(txn), 0);
///         log.append(b"a")?;
///         log.append(b"b")?;
///         log.root()
///     })
///     .unwrap();
/// assert_eq!(root.len(), 32);
/// ```
pub struct VerifiableLog<'t, D = Sha256> {
    tree_size: u64,
    storage: LogStorage<'t>,
    _hash: PhantomData<fn() -> D>,
}

impl<'t, D: Digest> VerifiableLog<'t, D> {
    /// Open a log of `tree_size` leaves stored in `txn`.
    pub fn new(txn: BucketTransaction<'t>, tree_size: u64) -> Self {
        Self {
            tree_size,
            storage: LogStorage::new(txn),
            _hash: PhantomData,
        }
    }

    /// Number of leaves.
    pub fn size(&self) -> u64 {
        self.tree_size
    }

    /// Current root hash. The empty log has root `H(0x00)`.
    pub fn root(&self) -> Result<Hash> {
        if self.tree_size == 0 {
            return Ok(empty_root::<D>());
        }

        let mut level = 0;
        while level_size(self.tree_size, level) % 2 == 0 {
            level += 1;
        }

        let last = level_size(self.tree_size, level) - 1;
        let mut acc = self.storage.get(level, last)?.leaf_digest;

        for i in (level + 1)..root_size(self.tree_size) {
            let size = level_size(self.tree_size, i);
            if size % 2 == 1 {
                let node = self.storage.get(i, size - 1)?;
                acc = branch_hash::<D>(&node.leaf_digest, &acc);
            }
        }

        Ok(acc)
    }

    /// Read the level-0 leaf at `index`.
    pub fn leaf(&self, index: u64) -> Result<LogLeaf> {
        if index >= self.tree_size {
            return Err(TrustlogError::ProofOutOfRange {
                index,
                tree_size: self.tree_size,
            });
        }
        self.storage.get(0, index)
    }

    /// Append raw `data` as a new leaf.
    pub fn append(&mut self, data: &[u8]) -> Result<LogLeaf> {
        let leaf = LogLeaf::branch(leaf_digest::<D>(data));
        self.push(leaf)
    }

    /// Append a key/value pair. Only `H(value)` is retained.
    pub fn append_kv(&mut self, key: &[u8], value: &[u8]) -> Result<LogLeaf> {
        let value_digest = digest::<D>(value);
        let leaf = LogLeaf {
            key: Some(key.to_vec()),
            leaf_digest: leaf_digest_kv::<D>(key, &value_digest),
            value_digest: Some(value_digest),
        };
        self.push(leaf)
    }

    fn push(&mut self, leaf: LogLeaf) -> Result<LogLeaf> {
        self.tree_size += 1;
        self.add_node_to_level(0, &leaf)?;
        Ok(leaf)
    }

    fn add_node_to_level(&self, level: usize, node: &LogLeaf) -> Result<()> {
        self.storage.append(self.tree_size, level, node)?;

        let size = level_size(self.tree_size, level);
        if size % 2 == 0 {
            let left = self.storage.get(level, size - 2)?;
            let right = self.storage.get(level, size - 1)?;
            let branch = branch_hash::<D>(&left.leaf_digest, &right.leaf_digest);
            self.add_node_to_level(level + 1, &LogLeaf::branch(branch))?;
        }

        Ok(())
    }

    /// Inclusion proof for leaf `index` in the tree of the first `size` leaves.
    ///
    /// An empty snapshot yields an empty proof.
    pub fn audit_proof(&self, index: u64, size: u64) -> Result<Vec<Hash>> {
        if size == 0 {
            return Ok(Vec::new());
        }
        if index >= size || size > self.tree_size {
            return Err(TrustlogError::ProofOutOfRange {
                index,
                tree_size: size,
            });
        }
        self.path_to_root_at_snapshot(index, 0, size)
    }

    /// Proof that the first `first` leaves are a prefix of the first `second`.
    ///
    /// Empty when `first == 0`, `first >= second` or `second` exceeds the log.
    pub fn consistency_proof(&self, first: u64, second: u64) -> Result<Vec<Hash>> {
        if first == 0 || first >= second || second > self.tree_size {
            return Ok(Vec::new());
        }

        let mut level = 0;
        let mut node = first - 1;
        while is_right_child(node) {
            node = parent(node);
            level += 1;
        }

        let mut proof = Vec::new();
        if node > 0 {
            proof.push(self.storage.get(level, node)?.leaf_digest);
        }

        proof.extend(self.path_to_root_at_snapshot(node, level, second)?);
        Ok(proof)
    }

    /// Sibling path from `(level, node)` to the root of the first `snapshot`
    /// leaves. `boundary` accumulates the hash of the incomplete right edge.
    fn path_to_root_at_snapshot(
        &self,
        mut node: u64,
        mut level: usize,
        snapshot: u64,
    ) -> Result<Vec<Hash>> {
        let mut path = Vec::new();
        if snapshot == 0 {
            return Ok(path);
        }

        let mut last = snapshot - 1;
        let mut boundary = self.storage.get(0, last)?.leaf_digest;

        for i in 0..level {
            if is_right_child(last) {
                let left = self.storage.get(i, last - 1)?;
                boundary = branch_hash::<D>(&left.leaf_digest, &boundary);
            }
            last = parent(last);
        }

        while last > 0 {
            let sibling = if is_right_child(node) { node - 1 } else { node + 1 };

            if sibling < last {
                path.push(self.storage.get(level, sibling)?.leaf_digest);
            } else if sibling == last {
                path.push(boundary.clone());
            }

            if is_right_child(last) {
                let left = self.storage.get(level, last - 1)?;
                boundary = branch_hash::<D>(&left.leaf_digest, &boundary);
            }

            level += 1;
            node = parent(node);
            last = parent(last);
        }

        Ok(path)
    }
}
