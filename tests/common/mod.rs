//! Scripted module loader driving the orchestrator in tests

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use serde_json::Value;
use tsload_core::{
    EngineKind, Error, ExtensionTable, FileProbe, ModuleValue, PackageManifest, Result,
    SourceLoader,
};

type ModuleFactory = Rc<dyn Fn() -> ModuleValue>;

/// In-memory stand-in for the host runtime's module system.
///
/// Files are registered as factories producing module values; evaluating a
/// path offers it to the installed probe first, the way a real hook sees
/// every file it compiles. Registration is recorded as a label bound to
/// the typed extensions, so tests can assert which configuration the hook
/// ended up with.
#[derive(Default)]
pub struct ScriptedLoader {
    files: RefCell<HashMap<PathBuf, ModuleFactory>>,
    manifests: RefCell<HashMap<PathBuf, PackageManifest>>,
    records: RefCell<BTreeSet<PathBuf>>,
    extensions: RefCell<ExtensionTable>,
    probe: RefCell<Option<Rc<dyn FileProbe>>>,
    eval_counts: RefCell<HashMap<PathBuf, usize>>,
    register_log: RefCell<Vec<String>>,
}

impl ScriptedLoader {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn add_file(&self, path: impl Into<PathBuf>, factory: impl Fn() -> ModuleValue + 'static) {
        self.files.borrow_mut().insert(path.into(), Rc::new(factory));
    }

    pub fn add_value(&self, path: impl Into<PathBuf>, value: Value) {
        self.add_file(path, move || ModuleValue::Value(value.clone()));
    }

    pub fn add_manifest(&self, dir: impl Into<PathBuf>, name: &str) {
        let manifest = PackageManifest {
            name: name.to_string(),
            raw: serde_json::json!({ "name": name }),
        };
        self.manifests.borrow_mut().insert(dir.into(), manifest);
    }

    pub fn eval_count(&self, path: impl AsRef<Path>) -> usize {
        self.eval_counts
            .borrow()
            .get(path.as_ref())
            .copied()
            .unwrap_or(0)
    }

    /// Drop the record for a path, as a host does between rebuilds
    pub fn evict(&self, path: impl AsRef<Path>) {
        self.records.borrow_mut().remove(path.as_ref());
    }

    /// Offer a path to the installed probe, simulating a transitive import
    /// seen by the hook.
    pub fn touch(&self, path: impl AsRef<Path>) -> bool {
        let probe = self.probe.borrow().clone();
        match probe {
            Some(probe) => probe.should_process(path.as_ref()),
            None => false,
        }
    }

    /// Labels of every engine registration, in order
    pub fn registrations(&self) -> Vec<String> {
        self.register_log.borrow().clone()
    }

    /// Label currently bound to an extension, if any
    pub fn extension_label(&self, ext: &str) -> Option<String> {
        self.extensions.borrow().get(ext).map(str::to_string)
    }

    fn engine_label(engine: EngineKind, options: &Value) -> String {
        format!("{engine}:{options}")
    }
}

impl SourceLoader for ScriptedLoader {
    fn resolve(&self, dir: &Path, request: &str) -> Option<PathBuf> {
        let as_path = Path::new(request);
        if as_path.is_absolute() {
            return self
                .files
                .borrow()
                .contains_key(as_path)
                .then(|| as_path.to_path_buf());
        }

        let typed = dir.join(format!("{request}.ts"));
        if self.files.borrow().contains_key(&typed) {
            return Some(typed);
        }

        if request.ends_with("/package.json") {
            let installed = dir.join("node_modules").join(request);
            if let Some(pkg_dir) = installed.parent() {
                if self.manifests.borrow().contains_key(pkg_dir) {
                    return Some(installed);
                }
            }
        }
        None
    }

    fn evaluate(&self, path: &Path) -> Result<ModuleValue> {
        let factory = self
            .files
            .borrow()
            .get(path)
            .cloned()
            .ok_or_else(|| Error::Engine(format!("no scripted module at {}", path.display())))?;

        *self
            .eval_counts
            .borrow_mut()
            .entry(path.to_path_buf())
            .or_insert(0) += 1;

        let probe = self.probe.borrow().clone();
        if let Some(probe) = probe {
            probe.should_process(path);
        }

        let value = factory();
        self.records.borrow_mut().insert(path.to_path_buf());
        Ok(value)
    }

    fn has_record(&self, path: &Path) -> bool {
        self.records.borrow().contains(path)
    }

    fn read_manifest(&self, dir: &Path) -> Option<PackageManifest> {
        self.manifests.borrow().get(dir).cloned()
    }

    fn register(
        &self,
        engine: EngineKind,
        options: &Value,
        probe: Rc<dyn FileProbe>,
    ) -> Result<()> {
        let label = Self::engine_label(engine, options);
        let mut table = ExtensionTable::new();
        table.bind("ts", label.clone());
        table.bind("tsx", label.clone());
        *self.extensions.borrow_mut() = table;
        *self.probe.borrow_mut() = Some(probe);
        self.register_log.borrow_mut().push(label);
        Ok(())
    }

    fn extensions(&self) -> ExtensionTable {
        self.extensions.borrow().clone()
    }

    fn set_extensions(&self, table: ExtensionTable) {
        *self.extensions.borrow_mut() = table;
        self.register_log.borrow_mut().push("substitute".to_string());
    }
}
