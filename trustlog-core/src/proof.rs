//! Standalone proof verification.
//!
//! Everything here is pure: roots are recomputed from a proof and compared
//! byte for byte with a claimed root. No storage, no live tree. This is what a
//! party that does not trust the log operator runs.
//!
//! # Proof Consumption
//!
//! Both verifiers must consume every proof entry exactly. A proof that is too
//! short, too long or addresses a level the tree does not have is rejected
//! rather than partially evaluated.

use sha2::Digest;

use crate::error::{Result, TrustlogError};
use crate::hash::{branch_hash, leaf_digest, split_point, Hash};

/// Recompute a root from a leaf hash and its audit path.
///
/// A level is skipped without consuming an entry when `index` is the last,
/// unpaired node of its level.
pub fn root_from_audit_proof<D: Digest>(
    leaf_hash: &[u8],
    proof: &[Hash],
    index: u64,
    tree_size: u64,
) -> Result<Hash> {
    if index >= tree_size {
        return Err(TrustlogError::ProofOutOfRange { index, tree_size });
    }

    let mut hash = leaf_hash.to_vec();
    let mut index = index;
    let mut size = tree_size;
    let mut remaining = proof.iter();

    let mut next = remaining.next();
    while let Some(sibling) = next {
        if index % 2 == 0 && index + 1 == size {
            if size == 1 {
                return Err(TrustlogError::InvalidProof(
                    "audit path is longer than the tree is high".into(),
                ));
            }
        } else {
            hash = if index % 2 == 0 {
                branch_hash::<D>(&hash, sibling)
            } else {
                branch_hash::<D>(sibling, &hash)
            };
            next = remaining.next();
        }
        index /= 2;
        size = size / 2 + size % 2;
    }

    Ok(hash)
}

/// Recompute either the old or the new root from a consistency proof.
///
/// Entries are consumed from the end of `proof`. `from_old` is true while the
/// recursion is still on the left edge, where the old root itself stands in for
/// the subtree.
pub fn root_from_consistency_proof<D: Digest>(
    old_size: u64,
    new_size: u64,
    proof: &[Hash],
    old_root: &[u8],
    compute_new_root: bool,
    from_old: bool,
) -> Result<Hash> {
    if old_size == new_size {
        return match (from_old, proof) {
            (true, []) => Ok(old_root.to_vec()),
            (false, [node]) => Ok(node.clone()),
            _ => Err(TrustlogError::InvalidProof(format!(
                "consistency proof has {} unused entries",
                proof.len()
            ))),
        };
    }

    let (next, rest) = proof
        .split_last()
        .ok_or_else(|| TrustlogError::InvalidProof("consistency proof is too short".into()))?;

    let k = split_point(new_size);
    if old_size <= k {
        let left =
            root_from_consistency_proof::<D>(old_size, k, rest, old_root, compute_new_root, from_old)?;
        if compute_new_root {
            Ok(branch_hash::<D>(&left, next))
        } else {
            Ok(left)
        }
    } else {
        let right = root_from_consistency_proof::<D>(
            old_size - k,
            new_size - k,
            rest,
            old_root,
            compute_new_root,
            false,
        )?;
        Ok(branch_hash::<D>(next, &right))
    }
}

/// Check that `leaf_data` is the leaf at `index` of the tree with `root`.
///
/// Returns `Ok(false)` on a root mismatch and an error on a malformed proof.
pub fn valid_audit_proof<D: Digest>(
    root: &[u8],
    tree_size: u64,
    index: u64,
    proof: &[Hash],
    leaf_data: &[u8],
) -> Result<bool> {
    let computed =
        root_from_audit_proof::<D>(&leaf_digest::<D>(leaf_data), proof, index, tree_size)?;
    Ok(computed == root)
}

/// Check that the tree of `old_size` leaves is a prefix of the one of `new_size`.
///
/// An empty old tree is consistent with anything. Equal sizes require equal
/// roots. Malformed proofs are simply invalid.
pub fn valid_consistency_proof<D: Digest>(
    old_root: &[u8],
    new_root: &[u8],
    old_size: u64,
    new_size: u64,
    proof: &[Hash],
) -> bool {
    if old_size == 0 {
        return true;
    }
    if old_size == new_size {
        return old_root == new_root;
    }
    if old_size > new_size {
        return false;
    }

    let computed_old = root_from_consistency_proof::<D>(old_size, new_size, proof, old_root, false, true);
    let computed_new = root_from_consistency_proof::<D>(old_size, new_size, proof, old_root, true, true);

    match (computed_old, computed_new) {
        (Ok(old), Ok(new)) => old == old_root && new == new_root,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sha2::Sha256;

    fn leaves(data: &[&[u8]]) -> Vec<Hash> {
        data.iter().map(|d| leaf_digest::<Sha256>(d)).collect()
    }

    #[test]
    fn test_single_leaf_needs_no_proof() {
        let leaf = leaf_digest::<Sha256>(b"a");
        assert!(valid_audit_proof::<Sha256>(&leaf, 1, 0, &[], b"a").unwrap());
    }

    #[test]
    fn test_two_leaf_audit() {
        let l = leaves(&[b"a", b"b"]);
        let root = branch_hash::<Sha256>(&l[0], &l[1]);

        assert!(valid_audit_proof::<Sha256>(&root, 2, 0, &[l[1].clone()], b"a").unwrap());
        assert!(valid_audit_proof::<Sha256>(&root, 2, 1, &[l[0].clone()], b"b").unwrap());
        assert!(!valid_audit_proof::<Sha256>(&root, 2, 1, &[l[0].clone()], b"a").unwrap());
    }

    #[test]
    fn test_audit_index_out_of_range() {
        let err = root_from_audit_proof::<Sha256>(&[0u8; 32], &[], 3, 3).unwrap_err();
        assert!(matches!(err, TrustlogError::ProofOutOfRange { .. }));
    }

    #[test]
    fn test_audit_excess_entries_rejected() {
        let leaf = leaf_digest::<Sha256>(b"a");
        let err =
            root_from_audit_proof::<Sha256>(&leaf, &[leaf.clone()], 0, 1).unwrap_err();
        assert!(matches!(err, TrustlogError::InvalidProof(_)));
    }

    #[test]
    fn test_consistency_empty_old_is_trivial() {
        assert!(valid_consistency_proof::<Sha256>(b"x", b"y", 0, 10, &[]));
    }

    #[test]
    fn test_consistency_equal_sizes_require_equal_roots() {
        assert!(valid_consistency_proof::<Sha256>(b"r", b"r", 4, 4, &[]));
        assert!(!valid_consistency_proof::<Sha256>(b"r", b"s", 4, 4, &[]));
    }

    #[test]
    fn test_consistency_empty_proof_is_invalid() {
        let l = leaves(&[b"a", b"b"]);
        let root = branch_hash::<Sha256>(&l[0], &l[1]);
        assert!(!valid_consistency_proof::<Sha256>(&l[0], &root, 1, 2, &[]));
    }

    #[test]
    fn test_consistency_one_to_two() {
        let l = leaves(&[b"a", b"b"]);
        let root = branch_hash::<Sha256>(&l[0], &l[1]);
        assert!(valid_consistency_proof::<Sha256>(&l[0], &root, 1, 2, &[l[1].clone()]));
        assert!(!valid_consistency_proof::<Sha256>(
            &l[0],
            &root,
            1,
            2,
            &[l[1].clone(), l[1].clone()]
        ));
    }

    #[test]
    fn test_consistency_shrinking_is_invalid() {
        assert!(!valid_consistency_proof::<Sha256>(b"a", b"b", 3, 2, &[]));
    }

    #[test]
    fn test_audit_at_maximum_tree_size() {
        let leaf = leaf_digest::<Sha256>(b"a");
        let root = root_from_audit_proof::<Sha256>(&leaf, &[vec![1u8; 32]], 0, u64::MAX).unwrap();
        assert_eq!(root, branch_hash::<Sha256>(&leaf, &[1u8; 32]));

        let last = root_from_audit_proof::<Sha256>(&leaf, &[], u64::MAX - 1, u64::MAX).unwrap();
        assert_eq!(last, leaf);
    }

    #[test]
    fn test_consistency_at_maximum_tree_size() {
        assert!(!valid_consistency_proof::<Sha256>(
            b"a",
            b"b",
            1,
            u64::MAX,
            &[vec![1u8; 32]]
        ));
    }
}
