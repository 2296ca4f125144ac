//! Audit proof command implementation.

use std::path::PathBuf;

use anyhow::bail;
use clap::Args;
use serde::Serialize;
use sha2::Sha256;
use trustlog_core::proof::root_from_audit_proof;
use trustlog_core::{Hash, LogBuckets, LogLeaf, StorageExt, VerifiableLog};

use crate::commands::{fail, load_config, node_head, root_at};
use crate::config::Config;
use crate::output;

/// Arguments for the audit-proof command.
#[derive(Args)]
pub struct AuditProofArgs {
    /// Node configuration file
    #[arg(short, long, default_value = "trustlog.toml")]
    pub config: PathBuf,

    /// Leaf index
    #[arg(short, long)]
    pub index: u64,

    /// Tree size to prove against (defaults to the current size)
    #[arg(short, long)]
    pub size: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct JsonOutput {
    index: u64,
    tree_size: u64,
    leaf_digest: String,
    root: String,
    proof: Vec<String>,
    verified: bool,
}

struct AuditReport {
    leaf: LogLeaf,
    size: u64,
    root: Hash,
    proof: Vec<Hash>,
    verified: bool,
}

fn audit(config: &Config, index: u64, size: Option<u64>) -> anyhow::Result<AuditReport> {
    let store = config.node_store()?;
    let log_id = &config.node.log_id;
    let head = node_head(store.as_ref(), log_id)?;

    let size = size.unwrap_or(head.log_size);
    if size > head.log_size {
        bail!("size {} is beyond the current log size {}", size, head.log_size);
    }
    if index >= size {
        bail!("index {} is outside a tree of size {}", index, size);
    }

    let buckets = LogBuckets::for_log(log_id);
    let (leaf, proof) = store.read(|txn| {
        let log: VerifiableLog = VerifiableLog::new(buckets.vlog().txn(txn), head.log_size);
        Ok((log.leaf(index)?, log.audit_proof(index, size)?))
    })?;

    let root = root_at(store.as_ref(), log_id, size)?;
    let computed = root_from_audit_proof::<Sha256>(&leaf.leaf_digest, &proof, index, size)?;

    Ok(AuditReport {
        verified: computed == root,
        leaf,
        size,
        root,
        proof,
    })
}

/// Run the audit-proof command.
pub fn run(args: AuditProofArgs) -> i32 {
    let Some(config) = load_config(&args.config) else {
        return 1;
    };

    let report = match audit(&config, args.index, args.size) {
        Ok(report) => report,
        Err(e) => return fail(e),
    };
    let exit_code = if report.verified { 0 } else { 1 };

    if args.json {
        let json = JsonOutput {
            index: args.index,
            tree_size: report.size,
            leaf_digest: hex::encode(&report.leaf.leaf_digest),
            root: hex::encode(&report.root),
            proof: report.proof.iter().map(hex::encode).collect(),
            verified: report.verified,
        };
        match serde_json::to_string_pretty(&json) {
            Ok(s) => println!("{}", s),
            Err(e) => return fail(e.into()),
        }
        return exit_code;
    }

    output::header(&format!("Audit proof for leaf {} at size {}", args.index, report.size));
    if let Some(key) = &report.leaf.key {
        output::kv("Key", &String::from_utf8_lossy(key));
    }
    output::kv("Leaf digest", &hex::encode(&report.leaf.leaf_digest));
    output::kv("Root", &hex::encode(&report.root));
    output::proof(&report.proof);
    println!();

    if report.verified {
        output::success("Proof verifies against the stored root");
    } else {
        output::error("Proof does not match the stored root");
    }
    exit_code
}
