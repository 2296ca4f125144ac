//! Leaf/branch hashing and binary tree arithmetic.
//!
//! # Hashing Rules
//!
//! - **Leaf**: `H(0x00 || data)`
//! - **Key/value leaf**: `H(0x00 || key || ':' || value_digest)`
//! - **Internal node**: `H(0x01 || left || right)`
//! - **Empty tree**: `H(0x00)`
//!
//! The prefixes and concatenation order are part of the wire contract between
//! independently operated logs and must never change.

use sha2::Digest;

/// A digest produced by the log hash function.
pub type Hash = Vec<u8>;

const LEAF_PREFIX: [u8; 1] = [0x00];
const BRANCH_PREFIX: [u8; 1] = [0x01];

/// Digest of a leaf holding raw `data`.
pub fn leaf_digest<D: Digest>(data: &[u8]) -> Hash {
    let mut hasher = D::new();
    hasher.update(LEAF_PREFIX);
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Digest of the empty tree, `H(0x00)`.
pub fn empty_root<D: Digest>() -> Hash {
    leaf_digest::<D>(&[])
}

/// Digest of a key/value leaf, where `value` is already a digest.
pub fn leaf_digest_kv<D: Digest>(key: &[u8], value: &[u8]) -> Hash {
    let mut hasher = D::new();
    hasher.update(LEAF_PREFIX);
    hasher.update(key);
    hasher.update(b":");
    hasher.update(value);
    hasher.finalize().to_vec()
}

/// Digest of an internal node.
pub fn branch_hash<D: Digest>(left: &[u8], right: &[u8]) -> Hash {
    let mut hasher = D::new();
    hasher.update(BRANCH_PREFIX);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().to_vec()
}

/// Plain digest of `data` with no domain prefix.
pub fn digest<D: Digest>(data: &[u8]) -> Hash {
    D::digest(data).to_vec()
}

/// Returns true if the node at `index` is the right child of its parent.
#[inline]
pub fn is_right_child(index: u64) -> bool {
    index % 2 == 1
}

/// Index of the parent of `index` one level up.
#[inline]
pub fn parent(index: u64) -> u64 {
    index / 2
}

/// Largest power of two strictly smaller than `n` (for `n > 1`).
pub fn split_point(n: u64) -> u64 {
    if n <= 1 {
        return 0;
    }
    1 << (63 - (n - 1).leading_zeros())
}

/// Number of complete nodes at `level` for a tree of `tree_size` leaves.
#[inline]
pub fn level_size(tree_size: u64, level: usize) -> u64 {
    if level >= 64 {
        0
    } else {
        tree_size >> level
    }
}

/// Number of levels that may hold nodes for a tree of `tree_size` leaves.
pub fn root_size(tree_size: u64) -> usize {
    if tree_size == 0 {
        return 0;
    }

    let mut size = tree_size;
    let mut levels = 1;
    while size > 0 {
        size /= 2;
        levels += 1;
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Sha256;

    #[test]
    fn test_empty_root_is_prefixed() {
        let expected: Hash = Sha256::digest([0u8]).to_vec();
        assert_eq!(empty_root::<Sha256>(), expected);
        assert_eq!(
            hex::encode(empty_root::<Sha256>()),
            "6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d"
        );
    }

    #[test]
    fn test_leaf_and_branch_are_domain_separated() {
        let leaf = leaf_digest::<Sha256>(b"ab");
        let branch = branch_hash::<Sha256>(b"a", b"b");
        assert_ne!(leaf, branch);
    }

    #[test]
    fn test_kv_leaf_layout() {
        let mut hasher = Sha256::new();
        hasher.update([0u8]);
        hasher.update(b"key");
        hasher.update(b":");
        hasher.update(b"value");
        let expected = hasher.finalize().to_vec();
        assert_eq!(leaf_digest_kv::<Sha256>(b"key", b"value"), expected);
    }

    #[test]
    fn test_split_point() {
        assert_eq!(split_point(2), 1);
        assert_eq!(split_point(3), 2);
        assert_eq!(split_point(4), 2);
        assert_eq!(split_point(5), 4);
        assert_eq!(split_point(8), 4);
        assert_eq!(split_point(9), 8);
        assert_eq!(split_point(1 << 63), 1 << 62);
        assert_eq!(split_point(u64::MAX), 1 << 63);
    }

    #[test]
    fn test_level_arithmetic() {
        assert_eq!(level_size(7, 0), 7);
        assert_eq!(level_size(7, 1), 3);
        assert_eq!(level_size(7, 2), 1);
        assert_eq!(level_size(7, 3), 0);
        assert_eq!(level_size(u64::MAX, 64), 0);

        assert_eq!(root_size(0), 0);
        assert_eq!(root_size(1), 2);
        assert_eq!(root_size(4), 4);
        assert_eq!(root_size(7), 4);
    }

    #[test]
    fn test_parity() {
        assert!(!is_right_child(0));
        assert!(is_right_child(1));
        assert_eq!(parent(5), 2);
    }
}
