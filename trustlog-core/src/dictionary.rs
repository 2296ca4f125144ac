//! Sparse Merkle map used as the authenticated dictionary of a log.
//!
//! Keys are addressed by `H(key)`, one bit per level, most significant bit
//! first. Empty subtrees are represented by an all-zero placeholder and a
//! subtree holding a single leaf collapses into that leaf, so the root depends
//! only on the current key set, not on insertion order.
//!
//! # Hashing Rules
//!
//! - **Leaf**: `H(0x00 || path || H(value))`
//! - **Internal node**: `H(0x01 || left || right)`
//! - **Empty subtree**: `[0u8; output_size]`
//!
//! Nodes are stored content-addressed (`hash -> preimage`) and never removed,
//! so a map can be reopened at any historical root.

use std::marker::PhantomData;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, TrustlogError};
use crate::hash::{digest, Hash};
use crate::storage::BucketTransaction;

const LEAF_PREFIX: u8 = 0x00;
const NODE_PREFIX: u8 = 0x01;

/// Key/value store with succinct membership and non-membership proofs.
pub trait AuthenticatedDictionary {
    /// Current root.
    fn root(&self) -> Hash;

    /// Value stored under `key`, if any.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Set `key` to `value`; an empty value removes the key. Returns the new root.
    fn update(&mut self, key: &[u8], value: &[u8]) -> Result<Hash>;

    /// Compact proof for `key` against the current root.
    fn prove_compact(&self, key: &[u8]) -> Result<CompactProof>;

    /// Check `proof` for `key -> value` against `root`. An empty `value`
    /// checks non-membership.
    fn verify_compact(proof: &CompactProof, root: &[u8], key: &[u8], value: &[u8]) -> bool
    where
        Self: Sized;
}

/// A proof with placeholder side nodes elided.
///
/// Bit `i` of `bitmask` is set when side node `i` (counted from the root) is a
/// placeholder and therefore absent from `side_nodes`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompactProof {
    /// Non-placeholder side nodes, root first
    pub side_nodes: Vec<Hash>,

    /// Placeholder positions
    pub bitmask: Vec<u8>,

    /// Total number of side nodes, including placeholders
    pub num_side_nodes: u32,

    /// `path || value_hash` of the leaf found on the key's path, when proving
    /// that a different key occupies it
    pub non_membership_leaf: Option<Vec<u8>>,
}

enum Node {
    Leaf { path: Hash, value_hash: Hash },
    Inner { left: Hash, right: Hash },
}

/// Sparse Merkle map over two buckets: `nodes` and `values`.
pub struct SparseMerkleMap<'t, D = Sha256> {
    nodes: BucketTransaction<'t>,
    values: BucketTransaction<'t>,
    root: Hash,
    _hash: PhantomData<fn() -> D>,
}

/// Root of a map with no keys.
pub fn empty_map_root<D: Digest>() -> Hash {
    vec![0u8; <D as Digest>::output_size()]
}

fn bit_at(path: &[u8], index: usize) -> bool {
    (path[index / 8] >> (7 - index % 8)) & 1 == 1
}

impl<'t, D: Digest> SparseMerkleMap<'t, D> {
    /// Open an empty map.
    pub fn new(nodes: BucketTransaction<'t>, values: BucketTransaction<'t>) -> Self {
        Self::import(nodes, values, empty_map_root::<D>())
    }

    /// Open the map at an existing `root`.
    pub fn import(nodes: BucketTransaction<'t>, values: BucketTransaction<'t>, root: Hash) -> Self {
        Self {
            nodes,
            values,
            root,
            _hash: PhantomData,
        }
    }

    fn depth() -> usize {
        <D as Digest>::output_size() * 8
    }

    fn placeholder() -> Hash {
        empty_map_root::<D>()
    }

    fn is_placeholder(hash: &[u8]) -> bool {
        hash.iter().all(|b| *b == 0)
    }

    fn leaf_preimage(path: &[u8], value_hash: &[u8]) -> Vec<u8> {
        let mut data = Vec::with_capacity(1 + path.len() + value_hash.len());
        data.push(LEAF_PREFIX);
        data.extend_from_slice(path);
        data.extend_from_slice(value_hash);
        data
    }

    fn inner_preimage(left: &[u8], right: &[u8]) -> Vec<u8> {
        let mut data = Vec::with_capacity(1 + left.len() + right.len());
        data.push(NODE_PREFIX);
        data.extend_from_slice(left);
        data.extend_from_slice(right);
        data
    }

    fn put_node(&self, preimage: Vec<u8>) -> Result<Hash> {
        let hash = digest::<D>(&preimage);
        self.nodes.set(&hash, &preimage)?;
        Ok(hash)
    }

    fn put_leaf(&self, path: &[u8], value_hash: &[u8]) -> Result<Hash> {
        self.put_node(Self::leaf_preimage(path, value_hash))
    }

    fn put_inner(&self, left: &[u8], right: &[u8]) -> Result<Hash> {
        if Self::is_placeholder(left) && Self::is_placeholder(right) {
            return Ok(Self::placeholder());
        }
        self.put_node(Self::inner_preimage(left, right))
    }

    fn load(&self, hash: &[u8]) -> Result<Node> {
        let data = self.nodes.get(hash)?;
        let size = <D as Digest>::output_size();

        match data.split_first() {
            Some((&LEAF_PREFIX, rest)) if rest.len() == 2 * size => Ok(Node::Leaf {
                path: rest[..size].to_vec(),
                value_hash: rest[size..].to_vec(),
            }),
            Some((&NODE_PREFIX, rest)) if rest.len() == 2 * size => Ok(Node::Inner {
                left: rest[..size].to_vec(),
                right: rest[size..].to_vec(),
            }),
            _ => Err(TrustlogError::Storage(format!(
                "corrupt map node {}",
                hex::encode(hash)
            ))),
        }
    }

    /// Join `node` and `sibling` one level above `depth`, ordered by `path`.
    fn join(&self, path: &[u8], depth: usize, node: &[u8], sibling: &[u8]) -> Result<Hash> {
        if bit_at(path, depth) {
            self.put_inner(sibling, node)
        } else {
            self.put_inner(node, sibling)
        }
    }

    /// Build the smallest subtree at `depth` holding two distinct leaves.
    fn split(
        &self,
        depth: usize,
        (path_a, hash_a): (&[u8], &[u8]),
        (path_b, hash_b): (&[u8], &[u8]),
    ) -> Result<Hash> {
        if depth >= Self::depth() {
            return Err(TrustlogError::Storage("map key paths collide".into()));
        }

        let bit_a = bit_at(path_a, depth);
        if bit_a == bit_at(path_b, depth) {
            let child = self.split(depth + 1, (path_a, hash_a), (path_b, hash_b))?;
            self.join(path_a, depth, &child, &Self::placeholder())
        } else if bit_a {
            self.put_inner(hash_b, hash_a)
        } else {
            self.put_inner(hash_a, hash_b)
        }
    }

    fn insert(&self, node: &[u8], depth: usize, path: &[u8], value_hash: &[u8]) -> Result<Hash> {
        if Self::is_placeholder(node) {
            return self.put_leaf(path, value_hash);
        }

        match self.load(node)? {
            Node::Leaf {
                path: existing,
                value_hash: _,
            } if existing == path => self.put_leaf(path, value_hash),
            Node::Leaf { path: existing, .. } => {
                let leaf = self.put_leaf(path, value_hash)?;
                self.split(depth, (path, leaf.as_slice()), (existing.as_slice(), node))
            }
            Node::Inner { left, right } => {
                let (child, sibling) = if bit_at(path, depth) {
                    (right, left)
                } else {
                    (left, right)
                };
                let child = self.insert(&child, depth + 1, path, value_hash)?;
                self.join(path, depth, &child, &sibling)
            }
        }
    }

    fn is_leaf(&self, hash: &[u8]) -> Result<bool> {
        if Self::is_placeholder(hash) {
            return Ok(false);
        }
        Ok(matches!(self.load(hash)?, Node::Leaf { .. }))
    }

    /// Returns `None` when `path` is absent and nothing changed.
    fn remove(&self, node: &[u8], depth: usize, path: &[u8]) -> Result<Option<Hash>> {
        if Self::is_placeholder(node) {
            return Ok(None);
        }

        match self.load(node)? {
            Node::Leaf { path: existing, .. } => {
                if existing == path {
                    Ok(Some(Self::placeholder()))
                } else {
                    Ok(None)
                }
            }
            Node::Inner { left, right } => {
                let (child, sibling) = if bit_at(path, depth) {
                    (right, left)
                } else {
                    (left, right)
                };

                let child = match self.remove(&child, depth + 1, path)? {
                    Some(child) => child,
                    None => return Ok(None),
                };

                // A subtree left with a single leaf collapses into it.
                if Self::is_placeholder(&child) && self.is_leaf(&sibling)? {
                    return Ok(Some(sibling));
                }
                if Self::is_placeholder(&sibling) && self.is_leaf(&child)? {
                    return Ok(Some(child));
                }

                self.join(path, depth, &child, &sibling).map(Some)
            }
        }
    }

    fn side_nodes(&self, path: &[u8]) -> Result<(Vec<Hash>, Option<(Hash, Hash)>)> {
        let mut sides = Vec::new();
        let mut node = self.root.clone();
        let mut depth = 0;

        loop {
            if Self::is_placeholder(&node) {
                return Ok((sides, None));
            }
            match self.load(&node)? {
                Node::Leaf { path, value_hash } => return Ok((sides, Some((path, value_hash)))),
                Node::Inner { left, right } => {
                    let (next, side) = if bit_at(path, depth) {
                        (right, left)
                    } else {
                        (left, right)
                    };
                    sides.push(side);
                    node = next;
                    depth += 1;
                }
            }
        }
    }
}

impl<D: Digest> AuthenticatedDictionary for SparseMerkleMap<'_, D> {
    fn root(&self) -> Hash {
        self.root.clone()
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let path = digest::<D>(key);
        match self.side_nodes(&path)? {
            (_, Some((found, value_hash))) if found == path => {
                self.values.get(&value_hash).map(Some)
            }
            _ => Ok(None),
        }
    }

    fn update(&mut self, key: &[u8], value: &[u8]) -> Result<Hash> {
        let path = digest::<D>(key);

        let root = if value.is_empty() {
            self.remove(&self.root, 0, &path)?
                .unwrap_or_else(|| self.root.clone())
        } else {
            let value_hash = digest::<D>(value);
            self.values.set(&value_hash, value)?;
            self.insert(&self.root, 0, &path, &value_hash)?
        };

        self.root = root;
        Ok(self.root.clone())
    }

    fn prove_compact(&self, key: &[u8]) -> Result<CompactProof> {
        let path = digest::<D>(key);
        let (sides, leaf) = self.side_nodes(&path)?;

        let non_membership_leaf = match leaf {
            Some((found, value_hash)) if found != path => {
                let mut data = found;
                data.extend_from_slice(&value_hash);
                Some(data)
            }
            _ => None,
        };

        let mut bitmask = vec![0u8; (sides.len() + 7) / 8];
        let mut side_nodes = Vec::new();
        for (i, side) in sides.iter().enumerate() {
            if Self::is_placeholder(side) {
                bitmask[i / 8] |= 1 << (i % 8);
            } else {
                side_nodes.push(side.clone());
            }
        }

        Ok(CompactProof {
            side_nodes,
            bitmask,
            num_side_nodes: sides.len() as u32,
            non_membership_leaf,
        })
    }

    fn verify_compact(proof: &CompactProof, root: &[u8], key: &[u8], value: &[u8]) -> bool {
        let count = proof.num_side_nodes as usize;
        if count > Self::depth() || proof.bitmask.len() != (count + 7) / 8 {
            return false;
        }

        let mut elided = proof.side_nodes.iter();
        let mut sides = Vec::with_capacity(count);
        for i in 0..count {
            if proof.bitmask[i / 8] & (1 << (i % 8)) != 0 {
                sides.push(Self::placeholder());
            } else {
                match elided.next() {
                    Some(side) => sides.push(side.clone()),
                    None => return false,
                }
            }
        }
        if elided.next().is_some() {
            return false;
        }

        let path = digest::<D>(key);
        let size = <D as Digest>::output_size();

        let mut current = if value.is_empty() {
            match &proof.non_membership_leaf {
                None => Self::placeholder(),
                Some(data) => {
                    if data.len() != 2 * size || data[..size] == path[..] {
                        return false;
                    }
                    digest::<D>(&Self::leaf_preimage(&data[..size], &data[size..]))
                }
            }
        } else {
            digest::<D>(&Self::leaf_preimage(&path, &digest::<D>(value)))
        };

        for (depth, side) in sides.iter().enumerate().rev() {
            let preimage = if bit_at(&path, depth) {
                Self::inner_preimage(side, &current)
            } else {
                Self::inner_preimage(&current, side)
            };
            current = if Self::is_placeholder(side) && Self::is_placeholder(&current) {
                Self::placeholder()
            } else {
                digest::<D>(&preimage)
            };
        }

        current == root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Bucket, MemoryStorage, StorageExt};

    type Map<'t> = SparseMerkleMap<'t, Sha256>;

    fn with_map<T>(f: impl FnOnce(&mut Map<'_>) -> Result<T>) -> T {
        let store = MemoryStorage::new();
        let bucket = Bucket::new("map");
        store
            .write(|txn| {
                let mut map = Map::new(bucket.cd("nodes").txn(txn), bucket.cd("values").txn(txn));
                f(&mut map)
            })
            .unwrap()
    }

    #[test]
    fn test_empty_map() {
        with_map(|map| {
            assert_eq!(map.root(), vec![0u8; 32]);
            assert_eq!(map.get(b"missing")?, None);
            Ok(())
        });
    }

    #[test]
    fn test_update_and_get() {
        with_map(|map| {
            map.update(b"a", b"1")?;
            map.update(b"b", b"2")?;
            map.update(b"c", b"3")?;
            assert_eq!(map.get(b"a")?, Some(b"1".to_vec()));
            assert_eq!(map.get(b"b")?, Some(b"2".to_vec()));
            assert_eq!(map.get(b"c")?, Some(b"3".to_vec()));
            assert_eq!(map.get(b"d")?, None);

            map.update(b"b", b"22")?;
            assert_eq!(map.get(b"b")?, Some(b"22".to_vec()));
            Ok(())
        });
    }

    #[test]
    fn test_root_is_order_independent() {
        let forward = with_map(|map| {
            for k in [b"k1", b"k2", b"k3", b"k4"] {
                map.update(k, k)?;
            }
            Ok(map.root())
        });
        let backward = with_map(|map| {
            for k in [b"k4", b"k3", b"k2", b"k1"] {
                map.update(k, k)?;
            }
            Ok(map.root())
        });
        assert_eq!(forward, backward);
    }

    #[test]
    fn test_delete_restores_previous_root() {
        with_map(|map| {
            map.update(b"a", b"1")?;
            let one = map.root();
            map.update(b"b", b"2")?;
            map.update(b"c", b"3")?;
            map.update(b"c", b"")?;
            map.update(b"b", b"")?;
            assert_eq!(map.root(), one);

            map.update(b"a", b"")?;
            assert_eq!(map.root(), empty_map_root::<Sha256>());

            // Removing an absent key is a no-op.
            map.update(b"zzz", b"")?;
            assert_eq!(map.root(), empty_map_root::<Sha256>());
            Ok(())
        });
    }

    #[test]
    fn test_membership_proofs() {
        with_map(|map| {
            for i in 0u8..16 {
                map.update(&[i], &[i, i])?;
            }
            let root = map.root();
            for i in 0u8..16 {
                let proof = map.prove_compact(&[i])?;
                assert!(Map::verify_compact(&proof, &root, &[i], &[i, i]));
                assert!(!Map::verify_compact(&proof, &root, &[i], &[i]));
                assert!(!Map::verify_compact(&proof, &root, &[i], b""));
            }
            Ok(())
        });
    }

    #[test]
    fn test_non_membership_proofs() {
        with_map(|map| {
            for i in 0u8..8 {
                map.update(&[i], b"v")?;
            }
            let root = map.root();
            for i in 100u8..110 {
                let proof = map.prove_compact(&[i])?;
                assert!(Map::verify_compact(&proof, &root, &[i], b""));
                assert!(!Map::verify_compact(&proof, &root, &[i], b"v"));
            }
            Ok(())
        });
    }

    #[test]
    fn test_empty_map_non_membership() {
        with_map(|map| {
            let proof = map.prove_compact(b"x")?;
            assert_eq!(proof.num_side_nodes, 0);
            assert!(Map::verify_compact(&proof, &map.root(), b"x", b""));
            Ok(())
        });
    }

    #[test]
    fn test_historical_root_is_readable() {
        let store = MemoryStorage::new();
        let bucket = Bucket::new("map");

        let old_root = store
            .write(|txn| {
                let mut map = Map::new(bucket.cd("nodes").txn(txn), bucket.cd("values").txn(txn));
                map.update(b"a", b"1")?;
                let old = map.root();
                map.update(b"a", b"2")?;
                Ok(old)
            })
            .unwrap();

        let value = store
            .read(|txn| {
                let map = Map::import(
                    bucket.cd("nodes").txn(txn),
                    bucket.cd("values").txn(txn),
                    old_root.clone(),
                );
                map.get(b"a")
            })
            .unwrap();
        assert_eq!(value, Some(b"1".to_vec()));
    }

    #[test]
    fn test_tampered_proof_rejected() {
        with_map(|map| {
            map.update(b"a", b"1")?;
            map.update(b"b", b"2")?;
            let root = map.root();
            let mut proof = map.prove_compact(b"a")?;
            proof.num_side_nodes += 1;
            assert!(!Map::verify_compact(&proof, &root, b"a", b"1"));
            Ok(())
        });
    }
}
