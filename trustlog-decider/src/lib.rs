//! # Trustlog Decider
//!
//! **Layer 2: one value from many logs**
//!
//! Several independent logs may publish different values for the same key.
//! This crate collects what each followed log says, verified against the head
//! this node trusts for it, and applies a configured policy to pick one.
//!
//! ## Features
//!
//! - **Strategies**: single log, minimum-percentage quorum, scripted policy,
//!   and ordered aggregates of these
//! - **Sandboxed Scripts**: rhai policies without module imports or host I/O
//! - **Parallel Fan-out**: unreachable or misbehaving logs become misses, not
//!   failures
//!
//! ## Quick Start
//!
//! ```rust
//! use trustlog_decider::{Decider, Observation};
//!
//! let observations = vec![
//!     Observation::new("A", "x"),
//!     Observation::new("B", "x"),
//!     Observation::new("C", "y"),
//!     Observation::new("D", "x"),
//! ];
//!
//! let output = Decider::percentage(30)?.decide(&observations)?;
//! assert_eq!(output.value, "x");
//! assert_eq!(output.confidence, 75);
//! # Ok::<(), trustlog_decider::DecisionError>(())
//! ```

pub mod config;
pub mod decider;
pub mod error;
pub mod query;
pub mod script;

// Re-export main types
pub use config::{build_decider, DeciderConfig};
pub use decider::{DecisionOutput, Decider, Observation};
pub use error::{DecisionError, Result};
pub use query::{decide_key, observe, KeyDecision, Miss};
pub use script::ScriptDecider;
