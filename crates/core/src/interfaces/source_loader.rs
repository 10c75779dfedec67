use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::Value;

use crate::error::Result;
use crate::types::{EngineKind, ModuleValue};

/// Scoping predicate installed alongside an engine registration.
///
/// Implementations of [`SourceLoader`] must offer every source file they
/// touch to the probe, whether or not the file ends up being compiled; the
/// orchestrator uses the calls both for filtering and for import-chain
/// recording.
pub trait FileProbe {
    /// Whether the active engine should compile `path`
    fn should_process(&self, path: &Path) -> bool;
}

/// Snapshot of the module-loading hook's extension table: file extension
/// mapped to a label identifying the engine configuration bound to it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionTable {
    bindings: BTreeMap<String, String>,
}

impl ExtensionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, ext: impl Into<String>, label: impl Into<String>) {
        self.bindings.insert(ext.into(), label.into());
    }

    pub fn get(&self, ext: &str) -> Option<&str> {
        self.bindings.get(ext).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }
}

/// Package descriptor for a directory, as discovered by the host loader
#[derive(Debug, Clone)]
pub struct PackageManifest {
    pub name: String,
    pub raw: Value,
}

/// The injected module-loading capability.
///
/// In a dynamically-loading host runtime this seam is a require-hook
/// monkey-patch; abstracting it keeps the orchestration logic portable and
/// lets tests drive the orchestrator with a scripted loader. Methods take
/// `&self` because compiled source can re-enter the orchestrator while an
/// evaluation is still on the stack; implementations use interior
/// mutability.
pub trait SourceLoader {
    /// Resolve `request` relative to `dir` to an absolute file path
    fn resolve(&self, dir: &Path, request: &str) -> Option<PathBuf>;

    /// Evaluate the module at `path` under the currently-installed hook
    fn evaluate(&self, path: &Path) -> Result<ModuleValue>;

    /// Whether the loader still holds its record for a previously
    /// evaluated path. Hosts evict records between incremental rebuilds;
    /// a missing record invalidates the cached result for that path.
    fn has_record(&self, path: &Path) -> bool;

    /// Read the package descriptor for a directory, if one exists
    fn read_manifest(&self, dir: &Path) -> Option<PackageManifest>;

    /// Register a compilation engine, reconfiguring the installed hook.
    /// The probe must be consulted for every file the hook sees from now
    /// until the next registration or table substitution.
    fn register(&self, engine: EngineKind, options: &Value, probe: Rc<dyn FileProbe>)
    -> Result<()>;

    /// Snapshot the current loader-extension table
    fn extensions(&self) -> ExtensionTable;

    /// Substitute a previously saved extension table without registering
    /// an engine again.
    fn set_extensions(&self, table: ExtensionTable);
}
