//! Project settings resolution and reuse
//!
//! Two settings requests for the same root are compared over the
//! diff-relevant subset of options (engine selection, engine options and
//! ignore patterns, excluding the property bag). Equal requests reuse the
//! cached instance and merely extend its property bag in place.

use std::path::PathBuf;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::Result;
use crate::state::OrchestratorState;
use crate::types::{EngineKind, EntryKind, PropertyBag};

/// Identity of a project root as discovered by the host environment
#[derive(Debug, Clone)]
pub struct ProjectMeta {
    pub root: PathBuf,
    pub name: String,
    /// Raw package descriptor, passed through to entry-point consumers
    pub package: Value,
}

impl ProjectMeta {
    pub fn new(root: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            name: name.into(),
            package: Value::Null,
        }
    }
}

/// Per-project compilation options
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ProjectOptions {
    /// Engine selection; the per-file transform engine when unset
    #[serde(default)]
    pub engine: Option<EngineKind>,
    /// Engine-specific option bag
    #[serde(default)]
    pub engine_options: Value,
    /// Path substrings the compilation hook must never process
    #[serde(default)]
    pub ignore: Vec<String>,
    /// Initial property-bag entries; not part of the settings identity
    #[serde(default)]
    pub props: Map<String, Value>,
}

/// The reduced subset of options that decides settings reuse
#[derive(Serialize)]
struct OptionDiff<'a> {
    engine: &'a Option<EngineKind>,
    engine_options: &'a Value,
    ignore: &'a [String],
}

impl OptionDiff<'_> {
    fn of(options: &ProjectOptions) -> OptionDiff<'_> {
        OptionDiff {
            engine: &options.engine,
            engine_options: &options.engine_options,
            ignore: &options.ignore,
        }
    }
}

/// Immutable settings shared by every Project for one (root, kind)
#[derive(Debug)]
pub struct ProjectSettings {
    meta: ProjectMeta,
    options: ProjectOptions,
    prop_bag: PropertyBag,
}

impl ProjectSettings {
    /// Resolve or derive the settings for a request, delegating the
    /// diff-equality decision. Returns whether the settings changed with
    /// respect to what was cached.
    pub(crate) fn resolve(
        state: &OrchestratorState,
        kind: EntryKind,
        meta: ProjectMeta,
        mut options: ProjectOptions,
        prop_bag: Option<PropertyBag>,
        persist: bool,
    ) -> Result<(bool, Rc<ProjectSettings>)> {
        let props = std::mem::take(&mut options.props);
        apply_defaults(&mut options, state.default_options());

        let bag = state.registry().prop_bag(&meta.root);
        bag.extend(&state.default_options().props);
        bag.extend(&props);
        if let Some(explicit) = prop_bag {
            if !explicit.ptr_eq(&bag) {
                bag.extend(&explicit.snapshot());
            }
        }

        let existing = state
            .registry()
            .cached_settings(&meta.root, &[kind, kind.fallback()]);

        if let Some(existing) = existing {
            let request = serde_json::to_value(OptionDiff::of(&options))?;
            let cached = serde_json::to_value(OptionDiff::of(&existing.options))?;
            if request == cached {
                debug!(root = %meta.root.display(), %kind, "settings unchanged, reusing instance");
                return Ok((false, existing));
            }
        }

        let settings = Rc::new(ProjectSettings {
            meta,
            options,
            prop_bag: bag,
        });

        if persist {
            state.registry().cache_settings(
                &settings.meta.root,
                kind,
                settings.clone(),
            );
        }

        Ok((true, settings))
    }

    pub fn meta(&self) -> &ProjectMeta {
        &self.meta
    }

    pub fn options(&self) -> &ProjectOptions {
        &self.options
    }

    pub fn prop_bag(&self) -> &PropertyBag {
        &self.prop_bag
    }
}

/// Merge process-wide default options beneath an explicit request.
///
/// Engine options merge when the engine kinds agree, or when the request
/// leaves the engine unset and defaults carry one.
fn apply_defaults(options: &mut ProjectOptions, defaults: &ProjectOptions) {
    let same_engine = options.engine.is_some() && options.engine == defaults.engine;
    let inherit = defaults.engine.is_some() || !defaults.engine_options.is_null();

    if same_engine || (options.engine.is_none() && inherit) {
        if defaults.engine.is_some() {
            options.engine = defaults.engine;
        }
        let mut merged = defaults.engine_options.clone();
        merge_values(&mut merged, &options.engine_options);
        options.engine_options = merged;
    }

    if options.ignore.is_empty() {
        options.ignore = defaults.ignore.clone();
    }
}

/// Deep JSON merge; overlay wins on conflicts, null overlay is a no-op
pub(crate) fn merge_values(target: &mut Value, overlay: &Value) {
    match (target, overlay) {
        (_, Value::Null) => {}
        (Value::Object(base), Value::Object(over)) => {
            for (key, value) in over {
                match base.get_mut(key) {
                    Some(slot) => merge_values(slot, value),
                    None => {
                        base.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (slot, other) => *slot = other.clone(),
    }
}
