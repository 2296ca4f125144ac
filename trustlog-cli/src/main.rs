//! Trustlog CLI
//!
//! Publish to a verifiable log, follow other logs and decide between them.

mod commands;
mod config;
mod output;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "trustlog")]
#[command(author = "LogicCrafter")]
#[command(version = "0.1.0")]
#[command(about = "Trustlog - verifiable logs with cross-log decisions", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an ed25519 signing key
    Keygen(commands::keygen::KeygenArgs),

    /// Publish key/value pairs to this node's log
    Submit(commands::submit::SubmitArgs),

    /// Show this node's head or a followed log's trusted head
    Head(commands::head::HeadArgs),

    /// Print and check an audit proof
    AuditProof(commands::audit_proof::AuditProofArgs),

    /// Print and check a consistency proof
    ConsistencyProof(commands::consistency_proof::ConsistencyProofArgs),

    /// Run one synchronization round over all followed logs
    Sync(commands::sync::SyncArgs),

    /// Decide a key across all followed logs
    Decide(commands::decide::DecideArgs),
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set, otherwise uses the config value.
pub(crate) fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let exit_code = match cli.command {
        Commands::Keygen(args) => commands::keygen::run(args),
        Commands::Submit(args) => commands::submit::run(args),
        Commands::Head(args) => commands::head::run(args),
        Commands::AuditProof(args) => commands::audit_proof::run(args),
        Commands::ConsistencyProof(args) => commands::consistency_proof::run(args),
        Commands::Sync(args) => commands::sync::run(args).await,
        Commands::Decide(args) => commands::decide::run(args).await,
    };

    std::process::exit(exit_code);
}
