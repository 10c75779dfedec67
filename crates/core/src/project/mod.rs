//! Project instances and their shared caches
//!
//! A Project pairs one entry kind with the settings resolved for its root.
//! Instances are cheap handles; the durable state (settings, module slot,
//! property bag) lives in the registry and is shared by every instance
//! derived for the same (root, kind).

mod module;
mod registry;
mod settings;

use std::path::Path;
use std::rc::Rc;

use tracing::debug;

pub use module::ProjectModule;
pub use registry::{ApiOptions, DeclaredPlugins, ProjectRegistry};
pub use settings::{ProjectMeta, ProjectOptions, ProjectSettings};

use crate::compiler::{Compiler, InitValue};
use crate::error::Result;
use crate::state::OrchestratorState;
use crate::types::{EntryFn, EntryKind, ModuleValue, PropertyBag, PublicContext};

/// Everything needed to request a Project
#[derive(Debug, Clone)]
pub struct ProjectDescriptor {
    pub kind: EntryKind,
    pub meta: ProjectMeta,
    pub options: ProjectOptions,
    /// Extra property-bag content merged into the root's shared bag
    pub prop_bag: Option<PropertyBag>,
}

/// One project root viewed through one entry kind
#[derive(Debug)]
pub struct Project {
    kind: EntryKind,
    settings: Rc<ProjectSettings>,
    module: Rc<ProjectModule>,
}

impl Project {
    /// Resolve a Project for the descriptor, reusing the cached instance
    /// when the settings request is diff-equal to what was cached.
    ///
    /// `persist` caches both settings and instance, and a persisted
    /// request whose settings changed supersedes both cache entries.
    /// `force_persist` caches the instance even when the settings are
    /// transient, but never overwrites an existing entry.
    pub fn get_project(
        state: &OrchestratorState,
        descriptor: ProjectDescriptor,
        persist: bool,
        force_persist: bool,
    ) -> Result<Rc<Project>> {
        let kind = descriptor.kind;
        let (changed, settings) = ProjectSettings::resolve(
            state,
            kind,
            descriptor.meta,
            descriptor.options,
            descriptor.prop_bag,
            persist,
        )?;
        let root = settings.meta().root.clone();

        let cached = state.registry().cached_project(&root, kind);
        let project = match cached {
            Some(existing) if !changed => existing,
            ref existing => {
                debug!(
                    root = %root.display(),
                    %kind,
                    replacing = existing.is_some(),
                    "instantiating project"
                );
                let module = state.registry().module(&root, kind);
                Rc::new(Project {
                    kind,
                    settings,
                    module,
                })
            }
        };

        if persist || force_persist {
            state
                .registry()
                .cache_project(&root, kind, project.clone(), changed && persist);
        }

        Ok(project)
    }

    /// Derive a sibling Project for the same root under another entry kind
    pub fn clone_as(
        &self,
        state: &OrchestratorState,
        kind: EntryKind,
        prop_bag: PropertyBag,
    ) -> Result<Rc<Project>> {
        Project::get_project(
            state,
            ProjectDescriptor {
                kind,
                meta: self.meta().clone(),
                options: self.options().clone(),
                prop_bag: Some(prop_bag),
            },
            false,
            false,
        )
    }

    pub fn kind(&self) -> EntryKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.settings.meta().name
    }

    pub fn root(&self) -> &Path {
        &self.settings.meta().root
    }

    pub fn meta(&self) -> &ProjectMeta {
        self.settings.meta()
    }

    pub fn options(&self) -> &ProjectOptions {
        self.settings.options()
    }

    pub fn settings(&self) -> &Rc<ProjectSettings> {
        &self.settings
    }

    pub fn prop_bag(&self) -> &PropertyBag {
        self.settings.prop_bag()
    }

    pub(crate) fn module(&self) -> &Rc<ProjectModule> {
        &self.module
    }

    pub fn module_value(&self) -> Option<ModuleValue> {
        self.module.value()
    }

    /// Whether this project's entry point already compiled to a value that
    /// is still backed by a live loader record.
    pub fn finalized(&self, state: &OrchestratorState) -> bool {
        self.module.finalized(state.loader().as_ref())
    }

    pub(crate) fn finalize(&self, value: ModuleValue) {
        self.module.finalize(value);
    }

    /// Merge behavior flags for a sibling entry kind of this root
    pub fn set_api_options(&self, state: &OrchestratorState, kind: EntryKind, update: ApiOptions) {
        state.registry().set_api_options(self.root(), kind, update);
    }

    pub fn api_options(&self, state: &OrchestratorState, kind: EntryKind) -> ApiOptions {
        state.registry().api_options(self.root(), kind)
    }

    /// Nest a plugin's import chains under this project's. Returns false
    /// when the pair was already linked.
    pub fn link_plugin_imports(&self, state: &OrchestratorState, plugin: &str) -> bool {
        state
            .imports()
            .borrow_mut()
            .link_plugin(self.name(), plugin)
    }

    /// Compile this project's entry point under an activated context
    pub(crate) fn compile(&self, state: &OrchestratorState, init: InitValue) -> Result<ModuleValue> {
        Compiler::new(self)?.compile(state, self, init)
    }

    /// Invoke an exported entry-point function with this project's public
    /// context and property bag.
    pub fn resolve_config_fn(
        &self,
        state: &OrchestratorState,
        config_fn: &EntryFn,
        as_project: Option<&Project>,
    ) -> Result<ModuleValue> {
        let source = as_project.unwrap_or(self);
        let ctx = PublicContext {
            project_root: source.root().to_path_buf(),
            imports: state.import_view(source.name()),
        };
        config_fn.call(&ctx, source.prop_bag())
    }
}
