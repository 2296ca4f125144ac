//! Submit command implementation.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::bail;
use clap::Args;
use serde::Serialize;
use trustlog_core::{KeyValuePair, Publisher, SignedHead};

use crate::commands::{fail, load_config};
use crate::config::Config;
use crate::output;

/// Arguments for the submit command.
#[derive(Args)]
pub struct SubmitArgs {
    /// Node configuration file
    #[arg(short, long, default_value = "trustlog.toml")]
    pub config: PathBuf,

    /// Alternating keys and values: KEY VALUE [KEY VALUE ...]
    #[arg(required = true, num_args = 2..)]
    pub pairs: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct JsonOutput {
    log_id: String,
    previous_size: u64,
    log_size: u64,
    log_root: String,
    dict_root: String,
}

fn publish(config: &Config, pairs: &[String]) -> anyhow::Result<(SignedHead, SignedHead)> {
    if pairs.len() % 2 != 0 {
        bail!("expected KEY VALUE pairs, got {} arguments", pairs.len());
    }
    let items: Vec<KeyValuePair> = pairs
        .chunks(2)
        .map(|pair| KeyValuePair::new(pair[0].as_str(), pair[1].as_str()))
        .collect();

    let publisher = Publisher::new(
        &config.node.log_id,
        config.node_store()?,
        Arc::new(config.signer()?),
    )?;
    let before = publisher.head()?;
    let after = publisher.publish(&items)?;
    Ok((before, after))
}

/// Run the submit command.
pub fn run(args: SubmitArgs) -> i32 {
    let Some(config) = load_config(&args.config) else {
        return 1;
    };

    let (before, after) = match publish(&config, &args.pairs) {
        Ok(heads) => heads,
        Err(e) => return fail(e),
    };

    if args.json {
        let json = JsonOutput {
            log_id: config.node.log_id.clone(),
            previous_size: before.log_size,
            log_size: after.log_size,
            log_root: hex::encode(&after.log_root),
            dict_root: hex::encode(&after.dict_root),
        };
        match serde_json::to_string_pretty(&json) {
            Ok(s) => println!("{}", s),
            Err(e) => return fail(e.into()),
        }
        return 0;
    }

    if after.log_size == before.log_size {
        output::info("Nothing new to publish; head unchanged");
    } else {
        output::success(&format!(
            "Published {} entries to '{}'",
            after.log_size - before.log_size,
            config.node.log_id
        ));
    }
    output::header("Signed Head");
    output::head(&after);
    0
}
