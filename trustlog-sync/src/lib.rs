//! # Trustlog Sync
//!
//! **Layer 1: following other logs**
//!
//! This crate lets a node keep a verified copy of the heads published by
//! other, independently operated logs.
//!
//! ## Features
//!
//! - **Log API**: transport-agnostic async access to heads, proofs and map values
//! - **Head Synchronization**: anti-rollback and anti-equivocation gates, signature
//!   and consistency checks before anything is persisted
//! - **Independent Tasks**: one background task per subscribed log
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use trustlog_core::{Ed25519Verifier, FjallStorage, Storage};
//! use trustlog_sync::{LocalLogApi, Subscription, SyncRegistry};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let remote_store: Arc<dyn Storage> = Arc::new(FjallStorage::open("remote.db")?);
//!     let local_store: Arc<dyn Storage> = Arc::new(FjallStorage::open("local.db")?);
//!
//!     let mut registry = SyncRegistry::new();
//!     registry.subscribe(Subscription {
//!         log_id: "builders".to_string(),
//!         store: local_store,
//!         remote: Arc::new(LocalLogApi::new("builders", remote_store)),
//!         verifier: Arc::new(Ed25519Verifier::from_hex("<public key hex>")?),
//!         poll_interval: Duration::from_secs(60),
//!     })?;
//!
//!     tokio::time::sleep(Duration::from_secs(3600)).await;
//!     registry.close_all().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod error;
pub mod registry;
pub mod sync;

// Re-export main types
pub use api::{LocalLogApi, LogApi, LogRegistry, MapValue};
pub use error::SyncError;
pub use registry::{sync_round, SyncRegistry};
pub use sync::{sync_once, trusted_head, HeadSynchronizer, Subscription, SyncHandle, SyncOutcome};
