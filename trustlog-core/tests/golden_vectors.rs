//! Fixed SHA-256 vectors shared with other log implementations.
//!
//! Any change to these values breaks proof exchange between independently
//! operated logs.

use sha2::Sha256;
use trustlog_core::hash::Hash;
use trustlog_core::proof::{valid_audit_proof, valid_consistency_proof};
use trustlog_core::{Bucket, MemoryStorage, StorageExt, VerifiableLog};

const ENTRIES: [&[u8]; 7] = [
    b"",
    b"a",
    b"b",
    b"c",
    b"d",
    b"efghijk",
    b"lmnopqrstuvwxyz",
];

const ROOTS: [&str; 8] = [
    "6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d",
    "6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d",
    "688dc6244b041199e7ab4990df6340ce3dc14caa5cd5a0e1131addaa1209e1a6",
    "652297b9504045a600942bcdf9ae5c2400be42d51139c7fb63ab3ee439ff110d",
    "4a9bab0b70e36b453e967468fc209705d9171fd05e9cf9e0ed6c2dff673fc790",
    "ff9cdaec73345d3896e37ff5681084b7be4097839f760e621412f9343d139f22",
    "a44a4f5f5190f8bf6acbfecc50e56374072196c17aa5fd46af01a5b9674307cf",
    "968244ebd454ce024d380be757b570886f8449f41395c761ec363a08a8f18210",
];

fn decode(hashes: &[&str]) -> Vec<Hash> {
    hashes.iter().map(|h| hex::decode(h).unwrap()).collect()
}

/// Run `f` against a log holding `entries`, recording the root after each append.
fn with_entries<T>(
    entries: &[&[u8]],
    f: impl FnOnce(&VerifiableLog<'_>, &[Hash]) -> trustlog_core::Result<T>,
) -> T {
    let store = MemoryStorage::new();
    let bucket = Bucket::new("log");

    store
        .write(|txn| {
            let mut log: VerifiableLog = VerifiableLog::new(bucket.txn(txn), 0);
            let mut roots = vec![log.root()?];
            for entry in entries {
                log.append(entry)?;
                roots.push(log.root()?);
            }
            f(&log, &roots)
        })
        .unwrap()
}

#[test]
fn test_abcd_root() {
    let root = with_entries(&[b"a", b"b", b"c", b"d"], |_, roots| Ok(roots.to_vec()));

    let expected = [
        "022a6979e6dab7aa5ae4c3e5e45f7e977112a7e63593820dbec1ec738a24f93c",
        "b137985ff484fb600db93107c77b0365c80d78f5b429ded0fd97361d077999eb",
        "36642e73c2540ab121e3a6bf9545b0a24982cd830eb13d3cd19de3ce6c021ec1",
        "33376a3bd63e9993708a84ddfe6c28ae58b83505dd1fed711bd924ec5a6239f0",
    ];
    let got: Vec<String> = root[1..].iter().map(hex::encode).collect();
    assert_eq!(got, expected);
}

#[test]
fn test_roots_after_each_append() {
    let roots = with_entries(&ENTRIES, |_, roots| Ok(roots.to_vec()));
    let got: Vec<String> = roots.iter().map(hex::encode).collect();
    assert_eq!(got, ROOTS);
}

#[test]
fn test_audit_proof_vectors() {
    let cases: Vec<(u64, u64, Vec<&str>)> = vec![
        (
            4,
            7,
            vec![
                "bc78703cecc49c1119746b7baa573cc39274b72f40fe1e6c242fc524b1acd3f6",
                "e6d714a0c30dbe89616ee317930e7821a18f18c5a80307e08fc92e7809e52d86",
                "4a9bab0b70e36b453e967468fc209705d9171fd05e9cf9e0ed6c2dff673fc790",
            ],
        ),
        (
            0,
            4,
            vec![
                "022a6979e6dab7aa5ae4c3e5e45f7e977112a7e63593820dbec1ec738a24f93c",
                "a5eb6e7bcfaaff4957c342e0cbfe88209dbe2058fc3e1a3455cc071922c85741",
            ],
        ),
        (
            1,
            2,
            vec!["6e340b9cffb37a989ca544e6bb780a2c78901d3fb33738768511a30617afa01d"],
        ),
        (
            3,
            5,
            vec![
                "57eb35615d47f34ec714cacdf5fd74608a5e8e102724e80b24b287c0c27b6a31",
                "688dc6244b041199e7ab4990df6340ce3dc14caa5cd5a0e1131addaa1209e1a6",
                "d070dc5b8da9aea7dc0f5ad4c29d89965200059c9a0ceca3abd5da2492dcb71d",
            ],
        ),
        (
            6,
            7,
            vec![
                "8b6d0afc750a7c94b7ee642e28f1db8c6c6dd7cec0ffccfc110b70a7504b215e",
                "4a9bab0b70e36b453e967468fc209705d9171fd05e9cf9e0ed6c2dff673fc790",
            ],
        ),
    ];

    with_entries(&ENTRIES, |log, roots| {
        for (index, size, expected) in &cases {
            let proof = log.audit_proof(*index, *size)?;
            assert_eq!(proof, decode(expected), "audit proof ({}, {})", index, size);

            let root = &roots[*size as usize];
            let valid =
                valid_audit_proof::<Sha256>(root, *size, *index, &proof, ENTRIES[*index as usize])?;
            assert!(valid, "audit proof ({}, {}) must verify", index, size);
        }
        Ok(())
    });
}

#[test]
fn test_consistency_proof_vectors() {
    let cases: Vec<(u64, u64, Vec<&str>)> = vec![
        (
            2,
            5,
            vec![
                "a5eb6e7bcfaaff4957c342e0cbfe88209dbe2058fc3e1a3455cc071922c85741",
                "d070dc5b8da9aea7dc0f5ad4c29d89965200059c9a0ceca3abd5da2492dcb71d",
            ],
        ),
        (
            1,
            7,
            vec![
                "022a6979e6dab7aa5ae4c3e5e45f7e977112a7e63593820dbec1ec738a24f93c",
                "a5eb6e7bcfaaff4957c342e0cbfe88209dbe2058fc3e1a3455cc071922c85741",
                "49ad1f129f0f126dd6b90955fb177ab8941be0d7b5d0085c4813fcabb62b6ec9",
            ],
        ),
        (
            3,
            7,
            vec![
                "57eb35615d47f34ec714cacdf5fd74608a5e8e102724e80b24b287c0c27b6a31",
                "597fcb31282d34654c200d3418fca5705c648ebf326ec73d8ddef11841f876d8",
                "688dc6244b041199e7ab4990df6340ce3dc14caa5cd5a0e1131addaa1209e1a6",
                "49ad1f129f0f126dd6b90955fb177ab8941be0d7b5d0085c4813fcabb62b6ec9",
            ],
        ),
        (
            4,
            7,
            vec!["49ad1f129f0f126dd6b90955fb177ab8941be0d7b5d0085c4813fcabb62b6ec9"],
        ),
        (1, 1, vec![]),
    ];

    with_entries(&ENTRIES, |log, roots| {
        for (first, second, expected) in &cases {
            let proof = log.consistency_proof(*first, *second)?;
            assert_eq!(proof, decode(expected), "consistency proof ({}, {})", first, second);

            assert!(valid_consistency_proof::<Sha256>(
                &roots[*first as usize],
                &roots[*second as usize],
                *first,
                *second,
                &proof,
            ));
        }
        Ok(())
    });
}

#[test]
fn test_proof_for_wrong_entry_fails() {
    with_entries(&ENTRIES, |log, roots| {
        let proof = log.audit_proof(4, 7)?;
        assert!(!valid_audit_proof::<Sha256>(&roots[7], 7, 4, &proof, b"not-d")?);
        assert!(!valid_audit_proof::<Sha256>(&roots[6], 7, 4, &proof, b"d")?);
        Ok(())
    });
}

#[test]
fn test_consistency_with_swapped_roots_fails() {
    with_entries(&ENTRIES, |log, roots| {
        let proof = log.consistency_proof(3, 7)?;
        assert!(!valid_consistency_proof::<Sha256>(&roots[4], &roots[7], 3, 7, &proof));
        assert!(!valid_consistency_proof::<Sha256>(&roots[3], &roots[6], 3, 7, &proof));
        Ok(())
    });
}
