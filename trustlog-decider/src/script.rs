//! Scripted decision policies.
//!
//! A policy is a [rhai](https://rhai.rs) script that defines
//! `fn decide(observations)`. Each observation is a map with `source` and
//! `value` string fields. The function returns the chosen value as a string,
//! or `()` to make no decision.
//!
//! ```rhai
//! fn decide(observations) {
//!     for o in observations {
//!         if o.source == "upstream" { return o.value; }
//!     }
//! }
//! ```
//!
//! The engine has no host functions registered and resolves no modules, so
//! `import` cannot reach the filesystem. `import` and `eval` are rejected at
//! compile time, `print` and `debug` go nowhere, and operations, call depth
//! and data sizes are capped.

use rhai::module_resolvers::DummyModuleResolver;
use rhai::{Array, Dynamic, Engine, Map, Scope, AST};

use crate::decider::{DecisionOutput, Observation};
use crate::error::{DecisionError, Result};

/// Confidence reported for scripted decisions.
pub const SCRIPT_CONFIDENCE: u32 = 1;

const ENTRY_POINT: &str = "decide";
const MAX_OPERATIONS: u64 = 1_000_000;
const MAX_CALL_LEVELS: usize = 32;
const MAX_STRING_SIZE: usize = 64 * 1024;
const MAX_ARRAY_SIZE: usize = 10_000;
const MAX_MAP_SIZE: usize = 1_000;

/// A compiled policy script.
pub struct ScriptDecider {
    engine: Engine,
    ast: AST,
}

fn sandboxed_engine() -> Engine {
    let mut engine = Engine::new();
    engine.set_module_resolver(DummyModuleResolver::new());
    engine.disable_symbol("import");
    engine.disable_symbol("eval");
    engine.on_print(|_| {});
    engine.on_debug(|_, _, _| {});
    engine.set_max_operations(MAX_OPERATIONS);
    engine.set_max_call_levels(MAX_CALL_LEVELS);
    engine.set_max_string_size(MAX_STRING_SIZE);
    engine.set_max_array_size(MAX_ARRAY_SIZE);
    engine.set_max_map_size(MAX_MAP_SIZE);
    engine
}

impl ScriptDecider {
    /// Compile `source`, which must define `fn decide(observations)`.
    pub fn new(source: &str) -> Result<Self> {
        let engine = sandboxed_engine();
        let ast = engine
            .compile(source)
            .map_err(|e| DecisionError::Script(e.to_string()))?;

        let has_entry_point = ast
            .iter_functions()
            .any(|f| f.name == ENTRY_POINT && f.params.len() == 1);
        if !has_entry_point {
            return Err(DecisionError::Script(format!(
                "script must define fn {}(observations)",
                ENTRY_POINT
            )));
        }

        Ok(Self { engine, ast })
    }

    /// Run the policy over `observations`.
    pub fn decide(&self, observations: &[Observation]) -> Result<DecisionOutput> {
        let input: Array = observations
            .iter()
            .map(|o| {
                let mut entry = Map::new();
                entry.insert("source".into(), Dynamic::from(o.source.clone()));
                entry.insert("value".into(), Dynamic::from(o.value.clone()));
                Dynamic::from_map(entry)
            })
            .collect();

        let result: Dynamic = self
            .engine
            .call_fn(&mut Scope::new(), &self.ast, ENTRY_POINT, (input,))
            .map_err(|e| DecisionError::Script(e.to_string()))?;

        if result.is_unit() {
            return Err(DecisionError::Script("script made no decision".to_string()));
        }

        let value = result
            .into_string()
            .map_err(|ty| DecisionError::Script(format!("decide returned {}, expected string", ty)))?;
        if value.is_empty() {
            return Err(DecisionError::Script("script returned an empty value".to_string()));
        }

        Ok(DecisionOutput {
            value,
            confidence: SCRIPT_CONFIDENCE,
        })
    }
}
