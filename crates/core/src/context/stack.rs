use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, error};

use super::CompilationContext;
use crate::imports::{ImportChainRecorder, RecorderToken};
use crate::interfaces::{ExtensionTable, FileProbe, SourceLoader};
use crate::scope::ScopeGuard;
use crate::types::EngineKind;

#[derive(Debug, Clone)]
struct SavedContext {
    context: CompilationContext,
    /// Project-supplied ignore patterns active under this configuration
    ignore: Vec<String>,
    /// Hook-state snapshot taken right after the engine registered
    extensions: Option<ExtensionTable>,
}

/// What a push did to the logical stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PushOutcome {
    /// Same key already tops the stack; nothing to restore on exit
    Noop,
    /// Key seen before; remembered hook state can be reused
    Reused,
    /// Genuinely new key; real engine registration is required
    New,
}

/// What a pop requires of the caller
#[derive(Debug)]
pub(crate) enum RestoreAction {
    /// Stack underflow: fall back to the pristine pre-orchestrator state
    Pristine,
    /// The sole entry is the base configuration; leave it installed
    None,
    /// Reinstate the new top's remembered configuration
    Reconfigure {
        context: CompilationContext,
        extensions: Option<ExtensionTable>,
    },
}

/// Logical stack of compilation contexts plus remembered hook states.
///
/// The bottom entry is the base configuration: deactivating it leaves it
/// installed for any later ad-hoc loads, matching how a long-lived build
/// process keeps its root engine registered between passes.
#[derive(Debug, Default)]
pub struct ContextStack {
    remembered: HashMap<String, SavedContext>,
    stack: Vec<String>,
    /// Hook table captured before the first real registration
    base_extensions: Option<ExtensionTable>,
}

impl ContextStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub(crate) fn push(
        &mut self,
        key: &str,
        context: &CompilationContext,
        ignore: Vec<String>,
    ) -> PushOutcome {
        if self.stack.last().is_some_and(|top| top == key) {
            return PushOutcome::Noop;
        }

        let known = self.remembered.contains_key(key);
        if !known {
            self.remembered.insert(
                key.to_string(),
                SavedContext {
                    context: context.clone(),
                    ignore,
                    extensions: None,
                },
            );
        }
        self.stack.push(key.to_string());
        debug!(key, depth = self.stack.len(), known, "context activated");
        if known {
            PushOutcome::Reused
        } else {
            PushOutcome::New
        }
    }

    pub(crate) fn pop(&mut self) -> RestoreAction {
        match self.stack.len() {
            0 => RestoreAction::Pristine,
            1 => RestoreAction::None,
            _ => {
                self.stack.pop();
                let top = self.stack.last().expect("stack is non-empty");
                let saved = self
                    .remembered
                    .get(top)
                    .expect("stack keys are always remembered");
                debug!(key = top.as_str(), depth = self.stack.len(), "context restored");
                RestoreAction::Reconfigure {
                    context: saved.context.clone(),
                    extensions: saved.extensions.clone(),
                }
            }
        }
    }

    pub(crate) fn save_extensions(&mut self, key: &str, table: ExtensionTable) {
        if let Some(saved) = self.remembered.get_mut(key) {
            saved.extensions = Some(table);
        }
    }

    pub(crate) fn saved_extensions(&self, key: &str) -> Option<ExtensionTable> {
        self.remembered.get(key).and_then(|s| s.extensions.clone())
    }

    pub(crate) fn base_extensions(&self) -> Option<ExtensionTable> {
        self.base_extensions.clone()
    }

    pub(crate) fn set_base_extensions(&mut self, table: ExtensionTable) {
        if self.base_extensions.is_none() {
            self.base_extensions = Some(table);
        }
    }

    /// Whether the configuration currently topping the stack ignores `path`
    pub(crate) fn current_ignore_matches(&self, path: &Path) -> bool {
        let Some(saved) = self.stack.last().and_then(|key| self.remembered.get(key)) else {
            return false;
        };
        let text = path.to_string_lossy();
        saved.ignore.iter().any(|pattern| text.contains(pattern.as_str()))
    }
}

/// The ignore/only predicate handed to engine registrations.
///
/// Consults the scope guard first, records in-scope files into the
/// current import chain, then applies the active configuration's ignore
/// patterns. Out-of-scope files pass through the hook untouched and are
/// never attributed to a chain.
pub(crate) struct HookProbe {
    scopes: Rc<RefCell<ScopeGuard>>,
    imports: Rc<RefCell<ImportChainRecorder>>,
    contexts: Rc<RefCell<ContextStack>>,
}

impl HookProbe {
    pub(crate) fn new(
        scopes: Rc<RefCell<ScopeGuard>>,
        imports: Rc<RefCell<ImportChainRecorder>>,
        contexts: Rc<RefCell<ContextStack>>,
    ) -> Self {
        Self {
            scopes,
            imports,
            contexts,
        }
    }
}

impl FileProbe for HookProbe {
    fn should_process(&self, path: &Path) -> bool {
        if !self.scopes.borrow().is_in_scope(path) {
            return false;
        }
        self.imports.borrow_mut().record(path);
        !self.contexts.borrow().current_ignore_matches(path)
    }
}

/// Scoped activation of a compilation context.
///
/// Dropping the guard exits the directory scope, restores the previous
/// import recorder, and pops the context stack, reinstating whichever hook
/// configuration the new top requires. Running this from `Drop` keeps the
/// pairing unconditional on every exit path, including unwinding errors.
pub struct ActivationGuard {
    loader: Rc<dyn SourceLoader>,
    scopes: Rc<RefCell<ScopeGuard>>,
    imports: Rc<RefCell<ImportChainRecorder>>,
    contexts: Rc<RefCell<ContextStack>>,
    root: PathBuf,
    token: Option<RecorderToken>,
    pushed: bool,
}

impl ActivationGuard {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        loader: Rc<dyn SourceLoader>,
        scopes: Rc<RefCell<ScopeGuard>>,
        imports: Rc<RefCell<ImportChainRecorder>>,
        contexts: Rc<RefCell<ContextStack>>,
        root: PathBuf,
        token: RecorderToken,
        pushed: bool,
    ) -> Self {
        Self {
            loader,
            scopes,
            imports,
            contexts,
            root,
            token: Some(token),
            pushed,
        }
    }

    /// Whether this activation pushed a new logical stack entry
    pub fn reconfigured(&self) -> bool {
        self.pushed
    }
}

impl Drop for ActivationGuard {
    fn drop(&mut self) {
        self.scopes.borrow_mut().exit(&self.root);
        if let Some(token) = self.token.take() {
            self.imports.borrow_mut().release(token);
        }
        if !self.pushed {
            return;
        }

        let action = self.contexts.borrow_mut().pop();
        match action {
            RestoreAction::None => {}
            RestoreAction::Pristine => {
                let base = self.contexts.borrow().base_extensions();
                if let Some(table) = base {
                    self.loader.set_extensions(table);
                }
            }
            RestoreAction::Reconfigure {
                context,
                extensions,
            } => match (context.engine, extensions) {
                (EngineKind::Transform, Some(table)) => {
                    self.loader.set_extensions(table);
                }
                (_, _) => {
                    // Registration is the only way back for the
                    // full-program engine.
                    let probe = Rc::new(HookProbe::new(
                        self.scopes.clone(),
                        self.imports.clone(),
                        self.contexts.clone(),
                    ));
                    if let Err(err) =
                        self.loader.register(context.engine, &context.options, probe)
                    {
                        error!(%err, "failed to restore compilation context");
                    }
                }
            },
        }
    }
}
