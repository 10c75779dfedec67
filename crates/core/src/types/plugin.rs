use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::module_value::EntryFn;

/// A declared extension reference, as it appears in a manifest
#[derive(Debug, Clone)]
pub enum PluginRef {
    /// Bare plugin name
    Name(String),
    /// Name plus options
    Spec(PluginSpec),
    /// Deferred resolver producing further references when invoked
    Resolver(EntryFn),
}

impl From<&str> for PluginRef {
    fn from(name: &str) -> Self {
        PluginRef::Name(name.to_string())
    }
}

impl From<PluginSpec> for PluginRef {
    fn from(spec: PluginSpec) -> Self {
        PluginRef::Spec(spec)
    }
}

/// A fully-expanded extension declaration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginSpec {
    pub name: String,
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl PluginSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Map::new(),
        }
    }

    pub fn with_options(name: impl Into<String>, options: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            options,
        }
    }
}
