//! Compilation context stacking over the module-loading hook
//!
//! Exactly one engine configuration is physically active at a time; the
//! stack lets deeply nested logical activations enter and exit while the
//! right configuration is restored at each step.

mod stack;

use serde::Serialize;
use serde_json::Value;

pub use stack::{ActivationGuard, ContextStack};
pub(crate) use stack::{HookProbe, PushOutcome};

use crate::error::Result;
use crate::types::EngineKind;

/// An (engine selection, engine options) pair governing how on-demand
/// compilation behaves while active. Transient: contexts are pushed onto
/// the stack and popped, they are not long-lived entities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompilationContext {
    pub engine: EngineKind,
    pub options: Value,
}

impl CompilationContext {
    pub fn new(engine: EngineKind, options: Value) -> Self {
        Self { engine, options }
    }

    /// Canonical serialized form, used as the context's identity
    pub fn serialized(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Cache key combining this context with a project's hook
    /// customizations. Two activations with the same key restore the same
    /// remembered hook state.
    pub fn cache_key(&self, ignore: &[String]) -> Result<String> {
        let mut key = self.serialized()?;
        if !ignore.is_empty() {
            key.push(':');
            key.push_str(&serde_json::to_string(ignore)?);
        }
        Ok(key)
    }
}
