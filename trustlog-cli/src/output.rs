//! Terminal output formatting.

use colored::Colorize;
use trustlog_core::{Hash, SignedHead};

/// Print a success message.
pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg.green());
}

/// Print an error message.
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg.red());
}

/// Print an info message.
pub fn info(msg: &str) {
    println!("{} {}", "→".cyan(), msg);
}

/// Print a warning message.
pub fn warn(msg: &str) {
    println!("{} {}", "!".yellow().bold(), msg.yellow());
}

/// Print a header.
pub fn header(msg: &str) {
    println!("\n{}", msg.white().bold());
    println!("{}", "─".repeat(msg.chars().count()).dimmed());
}

/// Print a key-value pair.
pub fn kv(key: &str, value: &str) {
    println!("  {} {}", format!("{}:", key).dimmed(), value);
}

/// Print a signed head.
pub fn head(head: &SignedHead) {
    kv("Log size", &head.log_size.to_string());
    kv("Log root", &hex::encode(&head.log_root));
    kv("Dictionary root", &hex::encode(&head.dict_root));
    kv("Map head size", &head.map_head_size.to_string());
    kv("Map head root", &hex::encode(&head.map_head_root));
    kv("Signature", &hex::encode(&head.signature));
}

/// Print proof hashes, one per line.
pub fn proof(proof: &[Hash]) {
    if proof.is_empty() {
        kv("Proof", "(empty)");
        return;
    }
    for (i, hash) in proof.iter().enumerate() {
        kv(&format!("[{}]", i), &hex::encode(hash));
    }
}

/// Print a helpful hint.
pub fn hint(msg: &str) {
    println!("{} {}", "💡".dimmed(), msg.dimmed());
}
