//! Integration tests for entry-point orchestration

mod common;

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use common::ScriptedLoader;
use serde_json::json;
use tsload_core::{
    include_plugins, process_entry_point, EngineKind, EntryArgs, EntryFn, EntryKind, Error,
    InitValue, ModuleValue, OrchestratorState, PluginManifest, PluginRef, Project,
    ProjectDescriptor, ProjectMeta, ProjectOptions,
};

fn primary_descriptor(root: &str, name: &str, options: ProjectOptions) -> ProjectDescriptor {
    ProjectDescriptor {
        kind: EntryKind::Primary,
        meta: ProjectMeta::new(root, name),
        options,
        prop_bag: None,
    }
}

fn process_primary(state: &OrchestratorState, project: &Rc<Project>) -> ModuleValue {
    process_entry_point(
        state,
        EntryArgs {
            init: InitValue::Request("site-config".to_string()),
            project: project.clone(),
            expand_plugins: true,
        },
    )
    .unwrap()
}

fn spec_names(value: &ModuleValue) -> Vec<String> {
    let manifest = value.manifest().expect("expected a manifest value");
    manifest
        .extensions
        .iter()
        .map(|r| match r {
            PluginRef::Spec(spec) => spec.name.clone(),
            other => panic!("expected normalized spec, got {other:?}"),
        })
        .collect()
}

#[test]
fn test_primary_entry_compiles_once() {
    let loader = ScriptedLoader::new();
    loader.add_value("/proj/site-config.ts", json!({ "title": "demo" }));

    let state = OrchestratorState::new(loader.clone());
    let project = Project::get_project(
        &state,
        primary_descriptor("/proj", "proj", ProjectOptions::default()),
        true,
        false,
    )
    .unwrap();

    let first = process_primary(&state, &project);
    let second = process_primary(&state, &project);

    assert_eq!(loader.eval_count("/proj/site-config.ts"), 1);
    match (first, second) {
        (ModuleValue::Value(a), ModuleValue::Value(b)) => assert_eq!(a, b),
        other => panic!("expected plain values, got {other:?}"),
    }
}

#[test]
fn test_equal_settings_requests_reuse_the_instance() {
    let loader = ScriptedLoader::new();
    let state = OrchestratorState::new(loader);

    let options = ProjectOptions {
        engine: Some(EngineKind::Transform),
        engine_options: json!({ "presets": ["env"] }),
        ..Default::default()
    };

    let first = Project::get_project(
        &state,
        primary_descriptor("/proj", "proj", options.clone()),
        true,
        false,
    )
    .unwrap();
    let second = Project::get_project(
        &state,
        primary_descriptor("/proj", "proj", options),
        true,
        false,
    )
    .unwrap();

    assert!(Rc::ptr_eq(first.settings(), second.settings()));
    assert!(Rc::ptr_eq(&first, &second));

    let different = Project::get_project(
        &state,
        primary_descriptor(
            "/proj",
            "proj",
            ProjectOptions {
                engine: Some(EngineKind::Transform),
                engine_options: json!({ "presets": ["other"] }),
                ..Default::default()
            },
        ),
        true,
        false,
    )
    .unwrap();

    assert!(!Rc::ptr_eq(first.settings(), different.settings()));
}

#[test]
fn test_changed_settings_supersede_the_cached_instance() {
    let loader = ScriptedLoader::new();
    let state = OrchestratorState::new(loader);

    let initial = ProjectOptions {
        engine_options: json!({ "presets": ["a"] }),
        ..Default::default()
    };
    let replacement = ProjectOptions {
        engine_options: json!({ "presets": ["b"] }),
        ..Default::default()
    };

    Project::get_project(
        &state,
        primary_descriptor("/proj", "proj", initial),
        true,
        false,
    )
    .unwrap();

    let first = Project::get_project(
        &state,
        primary_descriptor("/proj", "proj", replacement.clone()),
        true,
        false,
    )
    .unwrap();
    let second = Project::get_project(
        &state,
        primary_descriptor("/proj", "proj", replacement),
        true,
        false,
    )
    .unwrap();

    // The replacement became canonical: equal requests converge on it
    assert!(Rc::ptr_eq(first.settings(), second.settings()));
    assert!(Rc::ptr_eq(&first, &second));
}

#[test]
fn test_nested_compilation_restores_outer_hook_state() {
    let loader = ScriptedLoader::new();
    let state = Rc::new(OrchestratorState::new(loader.clone()));

    loader.add_value("/b/site-config.ts", json!("b-done"));
    {
        let state = state.clone();
        let loader_inner = loader.clone();
        loader.add_file("/a/site-config.ts", move || {
            // Transitive import seen by the hook while `a` is compiling
            assert!(loader_inner.touch("/a/util.ts"));
            assert!(!loader_inner.touch("/elsewhere/x.ts"));

            let nested = Project::get_project(
                &state,
                ProjectDescriptor {
                    kind: EntryKind::Primary,
                    meta: ProjectMeta::new("/b", "b"),
                    options: ProjectOptions {
                        engine: Some(EngineKind::TypeStrip),
                        engine_options: json!({ "project": "tsconfig.json" }),
                        ..Default::default()
                    },
                    prop_bag: None,
                },
                true,
                false,
            )
            .unwrap();
            process_entry_point(
                &state,
                EntryArgs {
                    init: InitValue::Request("site-config".to_string()),
                    project: nested,
                    expand_plugins: true,
                },
            )
            .unwrap();
            ModuleValue::Value(json!("a-done"))
        });
    }

    let project = Project::get_project(
        &state,
        primary_descriptor("/a", "a", ProjectOptions::default()),
        true,
        false,
    )
    .unwrap();
    process_primary(&state, &project);

    // Outer transform engine, nested full-program engine, then the saved
    // outer table is substituted back
    let log = loader.registrations();
    assert_eq!(log.len(), 3, "log was {log:?}");
    assert!(log[0].starts_with("transform"));
    assert!(log[1].starts_with("type-strip"));
    assert_eq!(log[2], "substitute");
    assert!(loader.extension_label("ts").unwrap().starts_with("transform"));
    assert_eq!(state.context_depth(), 1);

    // Each file was attributed to the project compiling when it was seen
    assert_eq!(
        state.import_chain("a", EntryKind::Primary),
        vec![
            PathBuf::from("/a/site-config.ts"),
            PathBuf::from("/a/util.ts"),
        ],
    );
    assert_eq!(
        state.import_chain("b", EntryKind::Primary),
        vec![PathBuf::from("/b/site-config.ts")],
    );
}

#[test]
fn test_full_program_context_reregisters_on_restore() {
    let loader = ScriptedLoader::new();
    let state = Rc::new(OrchestratorState::new(loader.clone()));

    loader.add_value("/b/site-config.ts", json!("b-done"));
    {
        let state = state.clone();
        loader.add_file("/a/site-config.ts", move || {
            let nested = Project::get_project(
                &state,
                ProjectDescriptor {
                    kind: EntryKind::Primary,
                    meta: ProjectMeta::new("/b", "b"),
                    options: ProjectOptions {
                        engine: Some(EngineKind::Transform),
                        engine_options: json!({ "presets": ["env"] }),
                        ..Default::default()
                    },
                    prop_bag: None,
                },
                true,
                false,
            )
            .unwrap();
            process_entry_point(
                &state,
                EntryArgs {
                    init: InitValue::Request("site-config".to_string()),
                    project: nested,
                    expand_plugins: true,
                },
            )
            .unwrap();
            ModuleValue::Value(json!("a-done"))
        });
    }

    let project = Project::get_project(
        &state,
        primary_descriptor(
            "/a",
            "a",
            ProjectOptions {
                engine: Some(EngineKind::TypeStrip),
                engine_options: json!({ "project": "tsconfig.json" }),
                ..Default::default()
            },
        ),
        true,
        false,
    )
    .unwrap();
    process_primary(&state, &project);

    // Restoring the full-program engine is a real re-registration, not a
    // table substitution
    let log = loader.registrations();
    assert_eq!(log.len(), 3, "log was {log:?}");
    assert!(log[0].starts_with("type-strip"));
    assert!(log[1].starts_with("transform"));
    assert!(log[2].starts_with("type-strip"));
    assert!(loader.extension_label("ts").unwrap().starts_with("type-strip"));
}

#[test]
fn test_extension_list_ordering() {
    let loader = ScriptedLoader::new();
    let state = OrchestratorState::new(loader.clone());

    loader.add_file("/proj/site-config.ts", || {
        ModuleValue::Manifest(PluginManifest::new(vec![PluginRef::from("c")]))
    });

    include_plugins(
        &state,
        Path::new("/proj"),
        vec![
            PluginRef::from("a"),
            PluginRef::from("b"),
            PluginRef::Resolver(EntryFn::new(|_ctx, _props| {
                Ok(ModuleValue::Value(json!(["d"])))
            })),
        ],
    );

    let project = Project::get_project(
        &state,
        primary_descriptor("/proj", "proj", ProjectOptions::default()),
        true,
        false,
    )
    .unwrap();
    let value = process_primary(&state, &project);

    assert_eq!(spec_names(&value), vec!["a", "b", "c", "d"]);
}

#[test]
fn test_local_extension_compiled_and_linked() {
    let loader = ScriptedLoader::new();
    let state = OrchestratorState::new(loader.clone());

    loader.add_file("/proj/site-config.ts", || {
        ModuleValue::Manifest(PluginManifest::new(vec![PluginRef::from("local-one")]))
    });
    loader.add_manifest("/proj/plugins/local-one", "local-one");
    loader.add_value("/proj/plugins/local-one/site-config.ts", json!({ "ok": true }));

    let project = Project::get_project(
        &state,
        primary_descriptor("/proj", "proj", ProjectOptions::default()),
        true,
        false,
    )
    .unwrap();
    let value = process_primary(&state, &project);

    assert_eq!(spec_names(&value), vec!["local-one"]);
    assert_eq!(loader.eval_count("/proj/plugins/local-one/site-config.ts"), 1);

    // Reprocessing does not recompile the extension
    process_primary(&state, &project);
    assert_eq!(loader.eval_count("/proj/plugins/local-one/site-config.ts"), 1);

    let view = state.import_view("proj");
    let nested = view.plugins.get("local-one").expect("linked chain");
    assert_eq!(
        nested.chains[&EntryKind::Primary],
        vec![PathBuf::from("/proj/plugins/local-one/site-config.ts")],
    );
}

#[test]
fn test_companion_function_resolves_once_against_shared_bag() {
    let loader = ScriptedLoader::new();
    let state = Rc::new(OrchestratorState::new(loader.clone()));

    let bag = state.registry().prop_bag(Path::new("/proj"));
    bag.set("shared", json!("yes"));

    let calls = Rc::new(Cell::new(0usize));
    loader.add_value("/proj/site-config.ts", json!({ "title": "demo" }));
    {
        let calls = calls.clone();
        let bag = bag.clone();
        let state = state.clone();
        loader.add_file("/proj/site-node.ts", move || {
            let calls = calls.clone();
            let bag = bag.clone();
            let state = state.clone();
            ModuleValue::EntryFn(EntryFn::new(move |ctx, props| {
                // The deferred function runs before any companion value
                // is published
                let companion = Project::get_project(
                    &state,
                    ProjectDescriptor {
                        kind: EntryKind::Companion,
                        meta: ProjectMeta::new("/proj", "proj"),
                        options: ProjectOptions::default(),
                        prop_bag: None,
                    },
                    false,
                    false,
                )?;
                assert!(companion.module_value().is_none());

                calls.set(calls.get() + 1);
                assert!(props.ptr_eq(&bag));
                assert_eq!(ctx.project_root, PathBuf::from("/proj"));
                Ok(ModuleValue::Value(json!({ "hooks": true })))
            }))
        });
    }

    let project = Project::get_project(
        &state,
        primary_descriptor("/proj", "proj", ProjectOptions::default()),
        true,
        false,
    )
    .unwrap();

    process_primary(&state, &project);
    process_primary(&state, &project);

    assert_eq!(calls.get(), 1);
    // Companion shares the primary's activation, so only one registration
    assert_eq!(loader.registrations().len(), 1);

    let companion = Project::get_project(
        &state,
        ProjectDescriptor {
            kind: EntryKind::Companion,
            meta: ProjectMeta::new("/proj", "proj"),
            options: ProjectOptions::default(),
            prop_bag: None,
        },
        false,
        false,
    )
    .unwrap();
    assert!(companion.finalized(&state));
    match companion.module_value() {
        Some(ModuleValue::Value(v)) => assert_eq!(v, json!({ "hooks": true })),
        other => panic!("expected resolved companion value, got {other:?}"),
    }
}

#[test]
fn test_evicted_record_triggers_recompilation() {
    let loader = ScriptedLoader::new();
    let state = OrchestratorState::new(loader.clone());
    loader.add_value("/proj/site-config.ts", json!({ "title": "demo" }));

    let project = Project::get_project(
        &state,
        primary_descriptor("/proj", "proj", ProjectOptions::default()),
        true,
        false,
    )
    .unwrap();

    process_primary(&state, &project);
    assert_eq!(loader.eval_count("/proj/site-config.ts"), 1);

    loader.evict("/proj/site-config.ts");
    process_primary(&state, &project);
    assert_eq!(loader.eval_count("/proj/site-config.ts"), 2);
}

#[test]
fn test_request_cycle_short_circuits() {
    let loader = ScriptedLoader::new();
    let state = Rc::new(OrchestratorState::new(loader.clone()));

    {
        let state = state.clone();
        loader.add_file("/proj/site-config.ts", move || {
            let same = Project::get_project(
                &state,
                primary_descriptor("/proj", "proj", ProjectOptions::default()),
                true,
                false,
            )
            .unwrap();
            let inner = process_entry_point(
                &state,
                EntryArgs {
                    init: InitValue::Request("site-config".to_string()),
                    project: same,
                    expand_plugins: true,
                },
            )
            .unwrap();
            assert!(matches!(inner, ModuleValue::Value(serde_json::Value::Null)));
            ModuleValue::Value(json!({ "outer": true }))
        });
    }

    let project = Project::get_project(
        &state,
        primary_descriptor("/proj", "proj", ProjectOptions::default()),
        true,
        false,
    )
    .unwrap();
    let value = process_primary(&state, &project);

    assert_eq!(loader.eval_count("/proj/site-config.ts"), 1);
    match value {
        ModuleValue::Value(v) => assert_eq!(v, json!({ "outer": true })),
        other => panic!("expected outer value, got {other:?}"),
    }
}

#[test]
fn test_missing_entry_is_a_resolution_error() {
    let loader = ScriptedLoader::new();
    let state = OrchestratorState::new(loader);

    let project = Project::get_project(
        &state,
        primary_descriptor("/proj", "proj", ProjectOptions::default()),
        true,
        false,
    )
    .unwrap();

    let err = process_entry_point(
        &state,
        EntryArgs {
            init: InitValue::Request("site-config".to_string()),
            project,
            expand_plugins: true,
        },
    )
    .unwrap_err();
    assert!(matches!(err, Error::Resolution(_)));
}
