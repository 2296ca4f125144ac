//! Consistency proof command implementation.

use std::path::PathBuf;

use anyhow::bail;
use clap::Args;
use serde::Serialize;
use sha2::Sha256;
use trustlog_core::{valid_consistency_proof, Hash, LogBuckets, StorageExt, VerifiableLog};

use crate::commands::{fail, load_config, node_head, root_at};
use crate::config::Config;
use crate::output;

/// Arguments for the consistency-proof command.
#[derive(Args)]
pub struct ConsistencyProofArgs {
    /// Node configuration file
    #[arg(short, long, default_value = "trustlog.toml")]
    pub config: PathBuf,

    /// Older tree size
    #[arg(short, long)]
    pub first: u64,

    /// Newer tree size (defaults to the current size)
    #[arg(short, long)]
    pub second: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct JsonOutput {
    first: u64,
    second: u64,
    first_root: String,
    second_root: String,
    proof: Vec<String>,
    verified: bool,
}

struct ConsistencyReport {
    second: u64,
    first_root: Hash,
    second_root: Hash,
    proof: Vec<Hash>,
    verified: bool,
}

fn prove(config: &Config, first: u64, second: Option<u64>) -> anyhow::Result<ConsistencyReport> {
    let store = config.node_store()?;
    let log_id = &config.node.log_id;
    let head = node_head(store.as_ref(), log_id)?;

    let second = second.unwrap_or(head.log_size);
    if second > head.log_size {
        bail!("size {} is beyond the current log size {}", second, head.log_size);
    }
    if first > second {
        bail!("first size {} is larger than second size {}", first, second);
    }

    let buckets = LogBuckets::for_log(log_id);
    let proof = store.read(|txn| {
        let log: VerifiableLog = VerifiableLog::new(buckets.vlog().txn(txn), head.log_size);
        log.consistency_proof(first, second)
    })?;

    let first_root = root_at(store.as_ref(), log_id, first)?;
    let second_root = root_at(store.as_ref(), log_id, second)?;
    let verified =
        valid_consistency_proof::<Sha256>(&first_root, &second_root, first, second, &proof);

    Ok(ConsistencyReport {
        second,
        first_root,
        second_root,
        proof,
        verified,
    })
}

/// Run the consistency-proof command.
pub fn run(args: ConsistencyProofArgs) -> i32 {
    let Some(config) = load_config(&args.config) else {
        return 1;
    };

    let report = match prove(&config, args.first, args.second) {
        Ok(report) => report,
        Err(e) => return fail(e),
    };
    let exit_code = if report.verified { 0 } else { 1 };

    if args.json {
        let json = JsonOutput {
            first: args.first,
            second: report.second,
            first_root: hex::encode(&report.first_root),
            second_root: hex::encode(&report.second_root),
            proof: report.proof.iter().map(hex::encode).collect(),
            verified: report.verified,
        };
        match serde_json::to_string_pretty(&json) {
            Ok(s) => println!("{}", s),
            Err(e) => return fail(e.into()),
        }
        return exit_code;
    }

    output::header(&format!(
        "Consistency proof from size {} to {}",
        args.first, report.second
    ));
    output::kv("Old root", &hex::encode(&report.first_root));
    output::kv("New root", &hex::encode(&report.second_root));
    output::proof(&report.proof);
    println!();

    if report.verified {
        output::success("The older tree is a prefix of the newer one");
    } else {
        output::error("Proof does not link the two roots");
    }
    exit_code
}
