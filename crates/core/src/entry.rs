//! Entry-point processing
//!
//! Drives a project's entry through its full lifecycle: compile the raw
//! module, pair it with its companion entry, resolve an exported function,
//! finalize, and expand declared extensions. Re-entrant by construction;
//! compiled source is free to request further projects while an outer
//! request is still on the stack.

use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::compiler::InitValue;
use crate::error::Result;
use crate::plugins::process_plugin_cache;
use crate::project::{ApiOptions, Project};
use crate::state::OrchestratorState;
use crate::types::{EntryKind, ModuleValue, PluginManifest, PluginRef};

/// One entry-point request
pub struct EntryArgs {
    pub init: InitValue,
    pub project: Rc<Project>,
    /// Whether a declared-extensions module gets its list expanded; off
    /// for companion entries and resolver-produced values
    pub expand_plugins: bool,
}

/// Process a project's entry point to its final module value.
///
/// Finalized projects short-circuit to the cached value as long as the
/// loader still holds the entry's record. A request for an entry that is
/// already being compiled further up the stack returns its current value
/// instead of recursing forever.
pub fn process_entry_point(state: &OrchestratorState, args: EntryArgs) -> Result<ModuleValue> {
    let EntryArgs {
        init,
        project,
        expand_plugins,
    } = args;

    if project.finalized(state) {
        if let Some(value) = project.module_value() {
            return Ok(value);
        }
    }

    if !state.registry().enter_flight(project.root(), project.kind()) {
        warn!(
            root = %project.root().display(),
            kind = %project.kind(),
            "request cycle detected, returning the value compiled so far"
        );
        return Ok(project
            .module_value()
            .unwrap_or(ModuleValue::Value(Value::Null)));
    }
    let result = process_inner(state, &project, init, expand_plugins);
    state.registry().exit_flight(project.root(), project.kind());
    result
}

fn process_inner(
    state: &OrchestratorState,
    project: &Rc<Project>,
    init: InitValue,
    expand_plugins: bool,
) -> Result<ModuleValue> {
    let mut value = project.compile(state, init)?;

    // A nested request can finalize this project while the compile is
    // still on the stack; the earlier result wins.
    if project.finalized(state) {
        if let Some(existing) = project.module_value() {
            return Ok(existing);
        }
    }

    if project.kind() == EntryKind::Primary {
        process_companion(state, project)?;
    }

    let pending = match &value {
        ModuleValue::EntryFn(f) => Some(f.clone()),
        _ => None,
    };
    if let Some(config_fn) = pending {
        let resolve_now = project
            .api_options(state, project.kind())
            .resolve_immediate
            .unwrap_or(true);
        if !resolve_now {
            // Captured unresolved for the caller, which finalizes once it
            // actually invokes the function.
            return Ok(value);
        }
        debug!(
            root = %project.root().display(),
            kind = %project.kind(),
            "resolving exported entry-point function"
        );
        value = project.resolve_config_fn(state, &config_fn, None)?;
    }

    project.finalize(value.clone());

    if expand_plugins && project.kind() == EntryKind::Primary {
        if let ModuleValue::Manifest(manifest) = &value {
            let specs = process_plugin_cache(state, project, &manifest.extensions)?;
            value = ModuleValue::Manifest(PluginManifest {
                extensions: specs.into_iter().map(PluginRef::Spec).collect(),
                rest: manifest.rest.clone(),
            });
            project.finalize(value.clone());
        }
    }

    Ok(value)
}

/// Compile the companion entry paired with a primary entry, deferring its
/// exported function until the primary's compilation has settled, then
/// resolving it exactly once against the shared property bag.
fn process_companion(state: &OrchestratorState, project: &Rc<Project>) -> Result<()> {
    let Some(path) = state
        .loader()
        .resolve(project.root(), EntryKind::Companion.file_stem())
    else {
        return Ok(());
    };

    let companion_module = state.registry().module(project.root(), EntryKind::Companion);
    if companion_module.finalized(state.loader().as_ref()) {
        return Ok(());
    }

    project.set_api_options(
        state,
        EntryKind::Companion,
        ApiOptions {
            resolve_immediate: Some(false),
        },
    );
    let companion = project.clone_as(state, EntryKind::Companion, project.prop_bag().clone())?;
    let raw = process_entry_point(
        state,
        EntryArgs {
            init: InitValue::Path(path),
            project: companion.clone(),
            expand_plugins: false,
        },
    )?;
    project.set_api_options(
        state,
        EntryKind::Companion,
        ApiOptions {
            resolve_immediate: Some(true),
        },
    );

    if let ModuleValue::EntryFn(config_fn) = &raw {
        let resolved = companion.resolve_config_fn(state, config_fn, None)?;
        companion.finalize(resolved);
    }
    Ok(())
}
