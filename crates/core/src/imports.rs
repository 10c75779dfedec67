//! Import chain recording across nested compilations
//!
//! Every source file the active engine touches is attributed to the
//! project/entry-kind whose recorder is current. Recorders stack, so a
//! nested compilation temporarily redirects attribution and the outer
//! recorder resumes when the nested one is released.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use tracing::trace;

use crate::types::EntryKind;

#[derive(Debug, Clone, PartialEq, Eq)]
struct HandlerKey {
    project: String,
    kind: EntryKind,
}

#[derive(Debug, Clone)]
struct ActiveHandler {
    id: u64,
    key: HandlerKey,
}

/// Token returned by [`ImportChainRecorder::push`]; hand it back to
/// [`ImportChainRecorder::release`] to restore the previous recorder.
#[derive(Debug)]
#[must_use]
pub struct RecorderToken {
    id: u64,
    fresh: bool,
}

#[derive(Debug, Default)]
struct ProjectChains {
    by_kind: BTreeMap<EntryKind, Vec<PathBuf>>,
    /// Names of plugin projects whose chains are linked under this one
    plugins: BTreeSet<String>,
}

/// Read-only snapshot of a project's import tree, handed to entry-point
/// functions through the public context.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportView {
    pub chains: BTreeMap<EntryKind, Vec<PathBuf>>,
    pub plugins: BTreeMap<String, ImportView>,
}

/// Per-project, per-entry-kind import chains plus the recorder stack
#[derive(Debug, Default)]
pub struct ImportChainRecorder {
    chains: BTreeMap<String, ProjectChains>,
    current: Option<ActiveHandler>,
    previous: Vec<ActiveHandler>,
    next_id: u64,
}

impl ImportChainRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `project`/`kind` the current recorder, saving the one that was
    /// active. Pushing the recorder that is already current is a no-op, so
    /// re-entrant compilations of the same project never duplicate stack
    /// entries.
    pub fn push(&mut self, project: &str, kind: EntryKind) -> RecorderToken {
        let key = HandlerKey {
            project: project.to_string(),
            kind,
        };
        self.ensure_chain(&key);

        if let Some(current) = &self.current {
            if current.key == key {
                return RecorderToken {
                    id: current.id,
                    fresh: false,
                };
            }
        }

        let id = self.next_id;
        self.next_id += 1;
        if let Some(current) = self.current.take() {
            self.previous.push(current);
        }
        trace!(project, %kind, "import recorder pushed");
        self.current = Some(ActiveHandler { id, key });
        RecorderToken { id, fresh: true }
    }

    /// Undo a matching [`push`](Self::push). Tolerates out-of-order
    /// release: a token that is no longer current removes its own saved
    /// entry instead of clobbering the active recorder.
    pub fn release(&mut self, token: RecorderToken) {
        if !token.fresh {
            return;
        }
        match &self.current {
            Some(current) if current.id == token.id => {
                self.current = self.previous.pop();
            }
            _ => {
                self.previous.retain(|saved| saved.id != token.id);
            }
        }
    }

    /// Restore the most recently saved recorder, or clear if none
    pub fn pop(&mut self) {
        self.current = self.previous.pop();
    }

    /// Append `path` to the current recorder's chain; no-op when no
    /// recorder is active.
    pub fn record(&mut self, path: &Path) {
        let Some(current) = &self.current else {
            return;
        };
        let key = current.key.clone();
        self.chains
            .entry(key.project)
            .or_default()
            .by_kind
            .entry(key.kind)
            .or_default()
            .push(path.to_path_buf());
    }

    /// Nest `plugin`'s chains under `parent`'s chain map.
    ///
    /// Returns false when the pair is already linked. Re-linking is a safe
    /// no-op; earlier environments raised an error here, but repeated
    /// plugin discovery makes the idempotent behavior the usable one.
    pub fn link_plugin(&mut self, parent: &str, plugin: &str) -> bool {
        self.chains.entry(plugin.to_string()).or_default();
        let links = &mut self.chains.entry(parent.to_string()).or_default().plugins;
        if links.contains(plugin) {
            return false;
        }
        trace!(parent, plugin, "linked plugin import chain");
        links.insert(plugin.to_string());
        true
    }

    /// Snapshot the import tree rooted at `project`
    pub fn view(&self, project: &str) -> ImportView {
        let mut visited = BTreeSet::new();
        self.build_view(project, &mut visited)
    }

    /// Chain for one (project, kind) pair, empty if nothing was recorded
    pub fn chain(&self, project: &str, kind: EntryKind) -> Vec<PathBuf> {
        self.chains
            .get(project)
            .and_then(|p| p.by_kind.get(&kind))
            .cloned()
            .unwrap_or_default()
    }

    pub fn current_project(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.key.project.as_str())
    }

    fn ensure_chain(&mut self, key: &HandlerKey) {
        self.chains
            .entry(key.project.clone())
            .or_default()
            .by_kind
            .entry(key.kind)
            .or_default();
    }

    fn build_view(&self, project: &str, visited: &mut BTreeSet<String>) -> ImportView {
        if !visited.insert(project.to_string()) {
            return ImportView::default();
        }
        let Some(chains) = self.chains.get(project) else {
            return ImportView::default();
        };
        ImportView {
            chains: chains.by_kind.clone(),
            plugins: chains
                .plugins
                .iter()
                .map(|name| (name.clone(), self.build_view(name, visited)))
                .collect(),
        }
    }
}
