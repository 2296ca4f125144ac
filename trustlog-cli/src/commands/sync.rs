//! Sync command implementation.

use std::path::PathBuf;

use clap::Args;
use serde::Serialize;
use trustlog_sync::{sync_round, SyncOutcome, SyncRegistry};

use crate::commands::{fail, load_config};
use crate::output;

/// Arguments for the sync command.
#[derive(Args)]
pub struct SyncArgs {
    /// Node configuration file
    #[arg(short, long, default_value = "trustlog.toml")]
    pub config: PathBuf,

    /// Keep following every log until interrupted
    #[arg(short, long)]
    pub watch: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct JsonResult {
    log_id: String,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn describe(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Initialized { size } => format!("trusted at size {}", size),
        SyncOutcome::Unchanged { size } => format!("unchanged at size {}", size),
        SyncOutcome::Advanced { from, to } => format!("advanced from {} to {}", from, to),
    }
}

fn size_of(outcome: &SyncOutcome) -> u64 {
    match outcome {
        SyncOutcome::Initialized { size } | SyncOutcome::Unchanged { size } => *size,
        SyncOutcome::Advanced { to, .. } => *to,
    }
}

/// Run the sync command.
pub async fn run(args: SyncArgs) -> i32 {
    let Some(config) = load_config(&args.config) else {
        return 1;
    };

    let local = match config.node_store() {
        Ok(store) => store,
        Err(e) => return fail(e),
    };
    let subscriptions = match config.subscriptions(&local) {
        Ok(subscriptions) => subscriptions,
        Err(e) => return fail(e),
    };

    if subscriptions.is_empty() {
        output::warn("No subscriptions configured");
        output::hint("Add [[subscriptions]] entries to the config file.");
        return 0;
    }

    if args.watch {
        return watch(subscriptions).await;
    }

    let results = sync_round(&subscriptions).await;
    let failures = results.iter().filter(|(_, r)| r.is_err()).count();

    if args.json {
        let json: Vec<JsonResult> = results
            .iter()
            .map(|(log_id, result)| JsonResult {
                log_id: log_id.clone(),
                success: result.is_ok(),
                size: result.as_ref().ok().map(size_of),
                error: result.as_ref().err().map(|e| e.to_string()),
            })
            .collect();
        match serde_json::to_string_pretty(&json) {
            Ok(s) => println!("{}", s),
            Err(e) => return fail(e.into()),
        }
    } else {
        output::header("Synchronization round");
        for (log_id, result) in &results {
            match result {
                Ok(outcome) => output::success(&format!("{}: {}", log_id, describe(outcome))),
                Err(e) => output::error(&format!("{}: {}", log_id, e)),
            }
        }
    }

    if failures == 0 {
        0
    } else {
        1
    }
}

async fn watch(subscriptions: Vec<trustlog_sync::Subscription>) -> i32 {
    let mut registry = SyncRegistry::new();
    for subscription in subscriptions {
        if let Err(e) = registry.subscribe(subscription) {
            output::error(&e.to_string());
            let _ = registry.close_all().await;
            return 1;
        }
    }

    output::info(&format!(
        "Following {} logs; press Ctrl-C to stop",
        registry.log_ids().count()
    ));
    if let Err(e) = tokio::signal::ctrl_c().await {
        output::error(&format!("Cannot listen for Ctrl-C: {}", e));
    }

    match registry.close_all().await {
        Ok(()) => {
            output::success("Stopped");
            0
        }
        Err(e) => fail(e.into()),
    }
}
