//! Decide command implementation.

use std::path::PathBuf;

use clap::Args;
use trustlog_decider::{build_decider, decide_key, DecisionError, KeyDecision};

use crate::commands::{fail, load_config};
use crate::config::Config;
use crate::output;

/// Arguments for the decide command.
#[derive(Args)]
pub struct DecideArgs {
    /// Node configuration file
    #[arg(short, long, default_value = "trustlog.toml")]
    pub config: PathBuf,

    /// Key to decide
    pub key: String,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

async fn decide(config: &Config, key: &str) -> anyhow::Result<KeyDecision> {
    let decider = build_decider(&config.decider)?;
    let logs = config.log_registry()?;
    let local = config.node_store()?;
    Ok(decide_key(key.as_bytes(), &logs, local.as_ref(), &decider).await?)
}

/// Run the decide command.
pub async fn run(args: DecideArgs) -> i32 {
    let Some(config) = load_config(&args.config) else {
        return 1;
    };

    let result = match decide(&config, &args.key).await {
        Ok(result) => result,
        Err(e) => {
            if matches!(e.downcast_ref::<DecisionError>(), Some(DecisionError::NoStrategies)) {
                output::error(&e.to_string());
                output::hint("Add [[decider]] entries to the config file.");
                return 1;
            }
            return fail(e);
        }
    };

    if args.json {
        match serde_json::to_string_pretty(&result) {
            Ok(s) => println!("{}", s),
            Err(e) => return fail(e.into()),
        }
        return 0;
    }

    output::header(&format!("Decision for '{}'", args.key));
    output::kv("Value", &result.decision.value);
    output::kv("Confidence", &result.decision.confidence.to_string());
    output::kv("Agreeing logs", &result.sources.join(", "));
    for observation in &result.observations {
        output::kv(&format!("  {}", observation.source), &observation.value);
    }
    for miss in &result.misses {
        output::warn(&format!("{}: {}", miss.log_id, miss.reason));
    }
    0
}
