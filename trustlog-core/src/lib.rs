//! # Trustlog Core
//!
//! **Verifiable logs for cross-checking build outputs**
//!
//! This crate implements Layer 0 of trustlog: the append-only Merkle log,
//! standalone proof verification, the authenticated dictionary and the signed
//! head that binds them together. Independently operated logs use it to prove
//! what they published; consumers use it to check those claims without
//! trusting the operator.
//!
//! ## Features
//!
//! - **Deterministic**: Same appends → same root across all environments
//! - **Minimal**: No network I/O, no async, focused on core crypto
//! - **Durable**: [`FjallStorage`] commits each update as one write batch
//! - **Portable proofs**: RFC 6962-style leaf/branch domain separation
//!
//! ## Quick Start
//!
//! ```rust
//! use sha2::Sha256;
//! use trustlog_core::{proof, Bucket, MemoryStorage, StorageExt, VerifiableLog};
//!
//! let store = MemoryStorage::new();
//! let bucket = Bucket::new("log");
//!
//! let (root, audit) = store
//!     .write(|txn| {
//!         let mut log: VerifiableLog = VerifiableLog::new(bucket.txn(txn), 0);
//!         for entry in [&b"a"[..], b"b", b"c"] {
//!             log.append(entry)?;
//!         }
//!         Ok((log.root()?, log.audit_proof(1, 3)?))
//!     })
//!     .unwrap();
//!
//! assert!(proof::valid_audit_proof::<Sha256>(&root, 3, 1, &audit, b"b").unwrap());
//! ```

pub mod dictionary;
pub mod error;
pub mod fjall_store;
pub mod hash;
pub mod head;
pub mod log;
pub mod proof;
pub mod publisher;
pub mod signer;
pub mod storage;

// Re-export main types for convenience
pub use dictionary::{AuthenticatedDictionary, CompactProof, SparseMerkleMap};
pub use error::{Result, TrustlogError};
pub use fjall_store::FjallStorage;
pub use hash::Hash;
pub use head::{head_digest, sign_head, verify_head_signature, LogBuckets, SignedHead};
pub use log::{LogLeaf, VerifiableLog};
pub use proof::{valid_audit_proof, valid_consistency_proof};
pub use publisher::{KeyValuePair, MapEntry, Publisher};
pub use signer::{Ed25519Signer, Ed25519Verifier, HeadSigner, HeadVerifier};
pub use storage::{Bucket, BucketTransaction, MemoryStorage, Storage, StorageExt, Transaction};
