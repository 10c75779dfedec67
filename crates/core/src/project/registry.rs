//! First-request-wins caches for projects, settings and modules

use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::trace;

use super::module::ProjectModule;
use super::settings::ProjectSettings;
use super::Project;
use crate::types::{EntryFn, EntryKind, PluginSpec, PropertyBag};

/// Cross-cutting per-(root, kind) behavior flags, settable before the
/// matching entry point is processed.
#[derive(Debug, Clone, Default)]
pub struct ApiOptions {
    /// Whether an exported entry-point function is invoked as soon as the
    /// entry compiles. Unset means yes.
    pub resolve_immediate: Option<bool>,
}

impl ApiOptions {
    fn merge(&mut self, update: ApiOptions) {
        if update.resolve_immediate.is_some() {
            self.resolve_immediate = update.resolve_immediate;
        }
    }
}

/// Extensions declared ahead of compilation for one project root
#[derive(Debug, Clone, Default)]
pub struct DeclaredPlugins {
    /// Name/options declarations, processed first and compiled wherever
    /// they resolve
    pub normal: Vec<PluginSpec>,
    /// Deferred resolver functions, processed after everything else
    pub resolvers: Vec<EntryFn>,
}

type KindKey = (PathBuf, EntryKind);

/// All shared orchestrator caches. Single-threaded interior mutability:
/// nested compilations re-enter these maps while outer requests are still
/// on the stack, so borrows are kept short and nothing is held across a
/// loader call.
#[derive(Debug, Default)]
pub struct ProjectRegistry {
    settings: RefCell<HashMap<KindKey, Rc<ProjectSettings>>>,
    projects: RefCell<HashMap<KindKey, Rc<Project>>>,
    modules: RefCell<HashMap<KindKey, Rc<ProjectModule>>>,
    api_options: RefCell<HashMap<KindKey, ApiOptions>>,
    prop_bags: RefCell<HashMap<PathBuf, PropertyBag>>,
    declared: RefCell<HashMap<PathBuf, DeclaredPlugins>>,
    in_flight: RefCell<Vec<KindKey>>,
}

impl ProjectRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared property bag for a root, created on first request
    pub fn prop_bag(&self, root: &Path) -> PropertyBag {
        self.prop_bags
            .borrow_mut()
            .entry(root.to_path_buf())
            .or_default()
            .clone()
    }

    /// Cached settings for a root, trying each kind in order. A request
    /// for one entry kind can reuse the settings its sibling registered.
    pub(crate) fn cached_settings(
        &self,
        root: &Path,
        kinds: &[EntryKind],
    ) -> Option<Rc<ProjectSettings>> {
        let settings = self.settings.borrow();
        kinds
            .iter()
            .find_map(|kind| settings.get(&(root.to_path_buf(), *kind)).cloned())
    }

    /// Cache settings, superseding whatever was stored for the kind.
    /// Later equal requests converge on the newest instance.
    pub(crate) fn cache_settings(
        &self,
        root: &Path,
        kind: EntryKind,
        settings: Rc<ProjectSettings>,
    ) {
        self.settings
            .borrow_mut()
            .insert((root.to_path_buf(), kind), settings);
    }

    pub(crate) fn cached_project(&self, root: &Path, kind: EntryKind) -> Option<Rc<Project>> {
        self.projects
            .borrow()
            .get(&(root.to_path_buf(), kind))
            .cloned()
    }

    /// Cache a project instance. A superseding insert replaces the cached
    /// instance; otherwise the first cached instance wins, so transient
    /// derivations never overwrite the canonical entry.
    pub(crate) fn cache_project(
        &self,
        root: &Path,
        kind: EntryKind,
        project: Rc<Project>,
        supersede: bool,
    ) {
        let key = (root.to_path_buf(), kind);
        let mut projects = self.projects.borrow_mut();
        if supersede {
            projects.insert(key, project);
        } else {
            projects.entry(key).or_insert(project);
        }
    }

    /// Shared module slot for a (root, kind), created on first request
    pub(crate) fn module(&self, root: &Path, kind: EntryKind) -> Rc<ProjectModule> {
        self.modules
            .borrow_mut()
            .entry((root.to_path_buf(), kind))
            .or_default()
            .clone()
    }

    pub(crate) fn set_api_options(&self, root: &Path, kind: EntryKind, update: ApiOptions) {
        self.api_options
            .borrow_mut()
            .entry((root.to_path_buf(), kind))
            .or_default()
            .merge(update);
    }

    pub(crate) fn api_options(&self, root: &Path, kind: EntryKind) -> ApiOptions {
        self.api_options
            .borrow()
            .get(&(root.to_path_buf(), kind))
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn add_declared(&self, root: &Path, specs: Vec<PluginSpec>, resolvers: Vec<EntryFn>) {
        let mut declared = self.declared.borrow_mut();
        let entry = declared.entry(root.to_path_buf()).or_default();
        trace!(
            root = %root.display(),
            specs = specs.len(),
            resolvers = resolvers.len(),
            "extensions declared ahead of compilation"
        );
        entry.normal.extend(specs);
        entry.resolvers.extend(resolvers);
    }

    pub(crate) fn declared_plugins(&self, root: &Path) -> DeclaredPlugins {
        self.declared
            .borrow()
            .get(root)
            .cloned()
            .unwrap_or_default()
    }

    /// Mark a (root, kind) as being compiled right now. Returns false when
    /// it is already in flight, which signals a request cycle.
    pub(crate) fn enter_flight(&self, root: &Path, kind: EntryKind) -> bool {
        let key = (root.to_path_buf(), kind);
        let mut in_flight = self.in_flight.borrow_mut();
        if in_flight.contains(&key) {
            return false;
        }
        in_flight.push(key);
        true
    }

    pub(crate) fn exit_flight(&self, root: &Path, kind: EntryKind) {
        let key = (root.to_path_buf(), kind);
        let mut in_flight = self.in_flight.borrow_mut();
        if let Some(pos) = in_flight.iter().rposition(|k| *k == key) {
            in_flight.remove(pos);
        }
    }
}
