//! CLI command implementations.

pub mod audit_proof;
pub mod consistency_proof;
pub mod decide;
pub mod head;
pub mod keygen;
pub mod submit;
pub mod sync;

use std::path::Path;

use trustlog_core::{Hash, LogBuckets, SignedHead, Storage, StorageExt, VerifiableLog};

use crate::config::Config;
use crate::output;

/// Load the config and start logging at its level.
///
/// Prints the error and returns `None` if the config is unusable.
pub(crate) fn load_config(path: &Path) -> Option<Config> {
    match Config::load(path) {
        Ok(config) => {
            crate::setup_tracing(&config.log.level);
            Some(config)
        }
        Err(e) => {
            output::error(&format!("{:#}", e));
            output::hint("Pass --config <FILE> to use another configuration.");
            None
        }
    }
}

/// Print `err` with its causes and return the failure exit code.
pub(crate) fn fail(err: anyhow::Error) -> i32 {
    output::error(&format!("{:#}", err));
    1
}

/// Current head of the node's own log.
pub(crate) fn node_head(store: &dyn Storage, log_id: &str) -> anyhow::Result<SignedHead> {
    let buckets = LogBuckets::for_log(log_id);
    Ok(store.read(|txn| buckets.get_head(txn))?)
}

/// Root of the node's own log at `size`.
pub(crate) fn root_at(store: &dyn Storage, log_id: &str, size: u64) -> anyhow::Result<Hash> {
    let buckets = LogBuckets::for_log(log_id);
    Ok(store.read(|txn| {
        let log: VerifiableLog = VerifiableLog::new(buckets.vlog().txn(txn), size);
        log.root()
    })?)
}
