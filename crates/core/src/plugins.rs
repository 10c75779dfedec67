//! Extension discovery, normalization and compilation
//!
//! Extensions come from three places: declarations registered ahead of
//! compilation, the entry-point module's own list, and deferred resolver
//! functions. They are normalized into name/options pairs in declaration
//! order, and every extension that resolves to a directory gets its own
//! entry points compiled as child projects.

use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, trace};

use crate::compiler::InitValue;
use crate::entry::{process_entry_point, EntryArgs};
use crate::error::{Error, Result};
use crate::interfaces::PackageManifest;
use crate::project::{Project, ProjectDescriptor, ProjectMeta};
use crate::state::OrchestratorState;
use crate::types::{EntryKind, ModuleValue, PluginRef, PluginSpec};

/// Directory under a project root holding its local extensions
pub const LOCAL_PLUGIN_DIR: &str = "plugins";

/// Where a batch of extensions may be compiled from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PluginScope {
    /// Installed packages and local extensions both qualify
    All,
    /// Only extensions under the local plugins directory are compiled;
    /// installed packages are left to the host to load normally
    LocalOnly,
}

/// Declare extensions for `root` ahead of its compilation. Name and
/// name/options declarations are processed before the entry module's own
/// list; resolver functions are deferred until after it.
pub fn include_plugins(state: &OrchestratorState, root: &Path, plugins: Vec<PluginRef>) {
    let mut specs = Vec::new();
    let mut resolvers = Vec::new();
    for plugin in plugins {
        match plugin {
            PluginRef::Name(name) => specs.push(PluginSpec::new(name)),
            PluginRef::Spec(spec) => specs.push(spec),
            PluginRef::Resolver(f) => resolvers.push(f),
        }
    }
    state.registry().add_declared(root, specs, resolvers);
}

/// Combine the ahead-of-compilation declarations with the entry module's
/// own list into the final normalized extension list: declared first, the
/// module's own items next, deferred-resolver results last.
pub(crate) fn process_plugin_cache(
    state: &OrchestratorState,
    project: &Rc<Project>,
    module_declared: &[PluginRef],
) -> Result<Vec<PluginSpec>> {
    let cache = state.registry().declared_plugins(project.root());

    let declared: Vec<PluginRef> = cache.normal.into_iter().map(PluginRef::Spec).collect();
    let mut specs = process_plugins(state, project, &declared, PluginScope::All)?;

    specs.extend(process_plugins(
        state,
        project,
        module_declared,
        PluginScope::LocalOnly,
    )?);

    let resolvers: Vec<PluginRef> = cache.resolvers.into_iter().map(PluginRef::Resolver).collect();
    specs.extend(process_plugins(state, project, &resolvers, PluginScope::All)?);

    Ok(specs)
}

/// Normalize a batch of extension references and compile whichever ones
/// resolve within `scope`. The returned list preserves declaration order
/// and includes every normalized reference, compiled or not.
pub(crate) fn process_plugins(
    state: &OrchestratorState,
    project: &Rc<Project>,
    refs: &[PluginRef],
    scope: PluginScope,
) -> Result<Vec<PluginSpec>> {
    let mut specs = Vec::new();
    for plugin in refs {
        match plugin {
            PluginRef::Name(name) => specs.push(PluginSpec::new(name)),
            PluginRef::Spec(spec) => specs.push(spec.clone()),
            PluginRef::Resolver(f) => {
                let value = project.resolve_config_fn(state, f, None)?;
                for nested in plugin_refs_from_value(&value) {
                    match nested {
                        PluginRef::Name(name) => specs.push(PluginSpec::new(name)),
                        PluginRef::Spec(spec) => specs.push(spec),
                        PluginRef::Resolver(_) => {
                            debug!("resolver returned a nested resolver, ignoring");
                        }
                    }
                }
            }
        }
    }
    compile_plugins(state, project, &specs, scope)?;
    Ok(specs)
}

/// Extension references carried by a resolver's return value
fn plugin_refs_from_value(value: &ModuleValue) -> Vec<PluginRef> {
    match value {
        ModuleValue::Manifest(manifest) => manifest.extensions.clone(),
        ModuleValue::Value(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                serde_json::Value::String(name) => Some(PluginRef::Name(name.clone())),
                serde_json::Value::Object(_) => {
                    serde_json::from_value::<PluginSpec>(item.clone())
                        .ok()
                        .map(PluginRef::Spec)
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Compile the typed entry points of every extension in `specs` that
/// resolves to a directory. Each (project, extension) pair is compiled at
/// most once; the import-chain link doubles as the been-here marker.
fn compile_plugins(
    state: &OrchestratorState,
    project: &Rc<Project>,
    specs: &[PluginSpec],
    scope: PluginScope,
) -> Result<()> {
    for spec in specs {
        let local_only = scope == PluginScope::LocalOnly;
        let Some((dir, manifest)) = resolve_plugin(state, project.root(), &spec.name, local_only)?
        else {
            trace!(name = spec.name.as_str(), "extension has no local sources, skipping");
            continue;
        };
        if !project.link_plugin_imports(state, &spec.name) {
            continue;
        }

        for kind in EntryKind::ALL {
            let Some(entry) = state.loader().resolve(&dir, kind.file_stem()) else {
                continue;
            };
            let mut options = project.options().clone();
            options.props = spec.options.clone();
            let child = Project::get_project(
                state,
                ProjectDescriptor {
                    kind,
                    meta: ProjectMeta {
                        root: dir.clone(),
                        name: spec.name.clone(),
                        package: manifest.raw.clone(),
                    },
                    options,
                    prop_bag: Some(project.prop_bag().clone()),
                },
                true,
                false,
            )?;
            process_entry_point(
                state,
                EntryArgs {
                    init: InitValue::Path(entry),
                    project: child,
                    expand_plugins: true,
                },
            )?;
        }
    }
    Ok(())
}

/// Locate an extension's directory and package descriptor. Installed
/// packages are consulted first unless the batch is local-only; the local
/// plugins directory is the fallback either way. A missing local extension
/// is not an error, but an installed package with an unreadable descriptor
/// is.
fn resolve_plugin(
    state: &OrchestratorState,
    root: &Path,
    name: &str,
    local_only: bool,
) -> Result<Option<(PathBuf, PackageManifest)>> {
    if !local_only {
        let request = format!("{name}/package.json");
        if let Some(descriptor) = state.loader().resolve(root, &request) {
            let dir = descriptor
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default();
            let manifest = state.loader().read_manifest(&dir).ok_or_else(|| {
                Error::Resolution(format!(
                    "package descriptor for extension '{name}' is unreadable"
                ))
            })?;
            return Ok(Some((dir, manifest)));
        }
    }

    let dir = root.join(LOCAL_PLUGIN_DIR).join(name);
    Ok(state
        .loader()
        .read_manifest(&dir)
        .map(|manifest| (dir, manifest)))
}
