#![allow(dead_code)]

use std::path::PathBuf;

use assert_cmd::Command;
use tempfile::TempDir;
use trustlog_core::{Ed25519Signer, HeadSigner};

pub struct TestEnv {
    pub dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn trustlog(&self) -> Command {
        let mut cmd = Command::cargo_bin("trustlog").unwrap();
        cmd.current_dir(self.dir.path());
        cmd.env("NO_COLOR", "1");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Write a signing seed and return the matching public key.
    pub fn write_key(&self, name: &str, byte: u8) -> String {
        let seed = hex::encode([byte; 32]);
        std::fs::write(self.path(name), &seed).unwrap();
        hex::encode(Ed25519Signer::from_hex(&seed).unwrap().public_key())
    }

    /// Write a config file and return its path.
    pub fn write_config(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path(name);
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Configure a publishing node `log_id` with its own store and key.
    pub fn publisher(&self, log_id: &str, byte: u8) -> (PathBuf, String) {
        let public_key = self.write_key(&format!("{}.key", log_id), byte);
        let config = self.write_config(
            &format!("{}.toml", log_id),
            &format!(
                "[node]\nlog_id = \"{id}\"\nstore = \"{id}.db\"\nsigning_key_file = \"{id}.key\"\n\n[log]\nlevel = \"warn\"\n",
                id = log_id
            ),
        );
        (config, public_key)
    }
}
