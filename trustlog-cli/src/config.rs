//! TOML configuration for a trustlog node.
//!
//! ```toml
//! [node]
//! log_id = "builder"
//! store = "builder.db"
//! signing_key_file = "builder.key"
//!
//! [[subscriptions]]
//! log_id = "upstream"
//! store = "upstream.db"
//! public_key = "…"
//!
//! [[decider]]
//! engine = "percentage"
//! minimum = 60
//!
//! [log]
//! level = "info"
//! ```
//!
//! Relative paths are resolved against the directory of the config file. Each
//! store path names a Fjall database directory and may appear only once.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use trustlog_core::{Ed25519Signer, Ed25519Verifier, FjallStorage, Storage};
use trustlog_decider::DeciderConfig;
use trustlog_sync::{LocalLogApi, LogRegistry, Subscription};

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// This node's own log.
    pub node: NodeSection,
    /// Logs this node follows.
    #[serde(default)]
    pub subscriptions: Vec<SubscriptionSection>,
    /// Decision strategies, tried in order.
    #[serde(default)]
    pub decider: Vec<DeciderConfig>,
    /// Logging configuration.
    #[serde(default)]
    pub log: LogSection,
}

/// `[node]` section.
#[derive(Debug, Deserialize)]
pub struct NodeSection {
    /// Id of the log this node publishes.
    pub log_id: String,
    /// Directory holding the node's store.
    pub store: PathBuf,
    /// Hex-encoded ed25519 seed. Only needed to publish.
    pub signing_key_file: Option<PathBuf>,
}

/// `[[subscriptions]]` entry.
#[derive(Debug, Deserialize)]
pub struct SubscriptionSection {
    /// Id of the followed log.
    pub log_id: String,
    /// Store serving the followed log.
    pub store: PathBuf,
    /// Hex-encoded ed25519 public key of the log.
    pub public_key: String,
    /// Seconds between synchronization ticks.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    60
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load and validate the config at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        let mut config = Self::from_toml(&content)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        Ok(config)
    }

    /// Parse and validate a config.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("invalid config")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.node.log_id.is_empty() {
            bail!("node.log_id must not be empty");
        }
        for (i, sub) in self.subscriptions.iter().enumerate() {
            if sub.log_id.is_empty() {
                bail!("subscriptions[{}].log_id must not be empty", i);
            }
            if sub.log_id == self.node.log_id {
                bail!("node cannot subscribe to its own log '{}'", sub.log_id);
            }
            if sub.store == self.node.store {
                bail!("subscription '{}' must not share the node store", sub.log_id);
            }
            if self.subscriptions[..i].iter().any(|s| s.log_id == sub.log_id) {
                bail!("log '{}' is subscribed twice", sub.log_id);
            }
            if self.subscriptions[..i].iter().any(|s| s.store == sub.store) {
                bail!("subscription '{}' shares its store with another subscription", sub.log_id);
            }
        }
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.node.store);
        if let Some(key) = self.node.signing_key_file.as_mut() {
            resolve(key);
        }
        for sub in &mut self.subscriptions {
            resolve(&mut sub.store);
        }
    }

    /// Open the node's store.
    pub fn node_store(&self) -> Result<Arc<dyn Storage>> {
        open_store(&self.node.store)
    }

    /// Load the node's signing key.
    pub fn signer(&self) -> Result<Ed25519Signer> {
        let Some(path) = &self.node.signing_key_file else {
            bail!("node.signing_key_file is not configured");
        };
        let seed = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read signing key {}", path.display()))?;
        Ok(Ed25519Signer::from_hex(seed.trim())?)
    }

    /// API handles for every followed log.
    pub fn log_registry(&self) -> Result<LogRegistry> {
        let mut registry = LogRegistry::new();
        for sub in &self.subscriptions {
            registry.insert(Arc::new(LocalLogApi::new(&sub.log_id, open_store(&sub.store)?)));
        }
        Ok(registry)
    }

    /// One subscription per followed log, persisting into `local`.
    pub fn subscriptions(&self, local: &Arc<dyn Storage>) -> Result<Vec<Subscription>> {
        self.subscriptions
            .iter()
            .map(|sub| -> Result<Subscription> {
                let verifier = Ed25519Verifier::from_hex(&sub.public_key)
                    .with_context(|| format!("bad public key for '{}'", sub.log_id))?;
                Ok(Subscription {
                    log_id: sub.log_id.clone(),
                    store: local.clone(),
                    remote: Arc::new(LocalLogApi::new(&sub.log_id, open_store(&sub.store)?)),
                    verifier: Arc::new(verifier),
                    poll_interval: Duration::from_secs(sub.poll_interval_secs),
                })
            })
            .collect()
    }
}

fn open_store(path: &Path) -> Result<Arc<dyn Storage>> {
    let store = FjallStorage::open(path)
        .with_context(|| format!("cannot open store {}", path.display()))?;
    Ok(Arc::new(store))
}
