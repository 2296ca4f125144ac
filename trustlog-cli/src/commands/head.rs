//! Head command implementation.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use trustlog_core::SignedHead;
use trustlog_sync::trusted_head;

use crate::commands::{fail, load_config, node_head};
use crate::output;

/// Arguments for the head command.
#[derive(Args)]
pub struct HeadArgs {
    /// Node configuration file
    #[arg(short, long, default_value = "trustlog.toml")]
    pub config: PathBuf,

    /// Show the trusted head of this followed log instead
    #[arg(short, long)]
    pub log: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// JSON output structure.
#[derive(Serialize)]
struct JsonOutput {
    log_id: String,
    trusted: bool,
    log_size: u64,
    log_root: String,
    dict_root: String,
    map_head_size: u64,
    map_head_root: String,
    signature: String,
}

impl JsonOutput {
    fn new(log_id: &str, trusted: bool, head: &SignedHead) -> Self {
        Self {
            log_id: log_id.to_string(),
            trusted,
            log_size: head.log_size,
            log_root: hex::encode(&head.log_root),
            dict_root: hex::encode(&head.dict_root),
            map_head_size: head.map_head_size,
            map_head_root: hex::encode(&head.map_head_root),
            signature: hex::encode(&head.signature),
        }
    }
}

/// Run the head command.
pub fn run(args: HeadArgs) -> i32 {
    let Some(config) = load_config(&args.config) else {
        return 1;
    };
    let store = match config.node_store() {
        Ok(store) => store,
        Err(e) => return fail(e),
    };

    let log_id = args.log.as_deref().unwrap_or(&config.node.log_id);
    let trusted = log_id != config.node.log_id;

    let head = if trusted {
        match trusted_head(store.as_ref(), log_id) {
            Ok(Some(head)) => head,
            Ok(None) => {
                output::error(&format!("No trusted head for '{}' yet", log_id));
                output::hint("Run `trustlog sync` to fetch it.");
                return 1;
            }
            Err(e) => return fail(e.into()),
        }
    } else {
        match node_head(store.as_ref(), log_id) {
            Ok(head) => head,
            Err(e) => return fail(e),
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&JsonOutput::new(log_id, trusted, &head)) {
            Ok(s) => println!("{}", s),
            Err(e) => return fail(e.into()),
        }
        return 0;
    }

    if trusted {
        output::header(&format!("Trusted head of '{}'", log_id));
    } else {
        output::header(&format!("Head of '{}'", log_id));
    }
    output::head(&head);
    0
}
