use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use serde_json::{Map, Value};

use super::plugin::PluginRef;
use super::prop_bag::PropertyBag;
use crate::error::Result;
use crate::imports::ImportView;

/// Context handed to entry-point functions alongside the property bag
#[derive(Debug, Clone)]
pub struct PublicContext {
    /// Root directory of the project the function belongs to
    pub project_root: PathBuf,
    /// Snapshot of the import chains recorded for the project so far
    pub imports: ImportView,
}

/// The callable contract an entry point may export instead of a plain value
pub trait EntryPointFn {
    fn call(&self, ctx: &PublicContext, props: &PropertyBag) -> Result<ModuleValue>;
}

impl<F> EntryPointFn for F
where
    F: Fn(&PublicContext, &PropertyBag) -> Result<ModuleValue>,
{
    fn call(&self, ctx: &PublicContext, props: &PropertyBag) -> Result<ModuleValue> {
        self(ctx, props)
    }
}

/// Tagged wrapper for entry-point functions.
///
/// Functions are wrapped at the point of creation, so an arbitrary exported
/// function can never be mistaken for one that conforms to the entry-point
/// contract.
#[derive(Clone)]
pub struct EntryFn(Rc<dyn EntryPointFn>);

impl EntryFn {
    /// Wrap a closure as an entry-point function. Bounded on `Fn` directly
    /// so closure literals get the higher-ranked signature inferred.
    pub fn new(
        f: impl for<'a, 'b> Fn(&'a PublicContext, &'b PropertyBag) -> Result<ModuleValue> + 'static,
    ) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, ctx: &PublicContext, props: &PropertyBag) -> Result<ModuleValue> {
        self.0.call(ctx, props)
    }
}

impl fmt::Debug for EntryFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EntryFn")
    }
}

/// What evaluating an entry point produced
#[derive(Debug, Clone)]
pub enum ModuleValue {
    /// A plain exported value
    Value(Value),
    /// A function conforming to the entry-point contract, not yet resolved
    EntryFn(EntryFn),
    /// An entry-point module that declares extensions
    Manifest(PluginManifest),
}

impl ModuleValue {
    pub fn manifest(&self) -> Option<&PluginManifest> {
        match self {
            ModuleValue::Manifest(m) => Some(m),
            _ => None,
        }
    }

    pub fn is_entry_fn(&self) -> bool {
        matches!(self, ModuleValue::EntryFn(_))
    }
}

/// The "declares extensions" module shape
#[derive(Debug, Clone, Default)]
pub struct PluginManifest {
    /// Extension references, in declaration order
    pub extensions: Vec<PluginRef>,
    /// Remaining exported fields, passed through untouched
    pub rest: Map<String, Value>,
}

impl PluginManifest {
    pub fn new(extensions: Vec<PluginRef>) -> Self {
        Self {
            extensions,
            rest: Map::new(),
        }
    }
}
