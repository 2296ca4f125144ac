//! Keygen command implementation.

use std::path::PathBuf;

use clap::Args;
use trustlog_core::{Ed25519Signer, HeadSigner};

use crate::output;

/// Arguments for the keygen command.
#[derive(Args)]
pub struct KeygenArgs {
    /// Write the hex seed to this file instead of printing it
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Overwrite an existing key file
    #[arg(long)]
    pub force: bool,
}

/// Run the keygen command.
pub fn run(args: KeygenArgs) -> i32 {
    let signer = Ed25519Signer::generate();
    let seed = hex::encode(signer.seed());
    let public_key = hex::encode(signer.public_key());

    if let Some(path) = &args.out {
        if path.exists() && !args.force {
            output::error(&format!("{} already exists", path.display()));
            output::hint("Use --force to overwrite it.");
            return 1;
        }
        if let Err(e) = std::fs::write(path, format!("{}\n", seed)) {
            output::error(&format!("Cannot write {}: {}", path.display(), e));
            return 1;
        }
    }

    output::header("Signing Key");
    output::kv("Public key", &public_key);
    match &args.out {
        Some(path) => output::success(&format!("Seed written to {}", path.display())),
        None => {
            output::kv("Seed", &seed);
            output::warn("Keep the seed secret; anyone holding it can sign heads for your log.");
        }
    }

    0
}
