//! Orchestrator state and context activation
//!
//! All shared state is constructor-injected and reached through one value,
//! so two orchestrators in the same process never observe each other.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::debug;

use crate::context::{ActivationGuard, CompilationContext, ContextStack, HookProbe, PushOutcome};
use crate::error::Result;
use crate::imports::{ImportChainRecorder, ImportView};
use crate::interfaces::SourceLoader;
use crate::project::{Project, ProjectOptions, ProjectRegistry};
use crate::scope::ScopeGuard;
use crate::types::{EngineKind, EntryKind};

/// Owner of every moving part: the injected loader, the directory scope
/// guard, the import chain recorder, the context stack and the project
/// registry. Single-threaded by design; nested compilations re-enter
/// through `Rc` handles.
pub struct OrchestratorState {
    loader: Rc<dyn SourceLoader>,
    scopes: Rc<RefCell<ScopeGuard>>,
    imports: Rc<RefCell<ImportChainRecorder>>,
    contexts: Rc<RefCell<ContextStack>>,
    registry: ProjectRegistry,
    default_options: ProjectOptions,
}

impl OrchestratorState {
    pub fn new(loader: Rc<dyn SourceLoader>) -> Self {
        Self::with_default_options(loader, ProjectOptions::default())
    }

    /// Build a state whose per-project options default to `defaults`
    /// wherever a request leaves them unset.
    pub fn with_default_options(loader: Rc<dyn SourceLoader>, defaults: ProjectOptions) -> Self {
        Self {
            loader,
            scopes: Rc::new(RefCell::new(ScopeGuard::new())),
            imports: Rc::new(RefCell::new(ImportChainRecorder::new())),
            contexts: Rc::new(RefCell::new(ContextStack::new())),
            registry: ProjectRegistry::new(),
            default_options: defaults,
        }
    }

    pub fn loader(&self) -> &Rc<dyn SourceLoader> {
        &self.loader
    }

    pub fn registry(&self) -> &ProjectRegistry {
        &self.registry
    }

    pub fn default_options(&self) -> &ProjectOptions {
        &self.default_options
    }

    pub(crate) fn imports(&self) -> &Rc<RefCell<ImportChainRecorder>> {
        &self.imports
    }

    /// Snapshot of the import tree recorded for a project so far
    pub fn import_view(&self, project: &str) -> ImportView {
        self.imports.borrow().view(project)
    }

    /// Chain recorded for one (project, kind) pair
    pub fn import_chain(&self, project: &str, kind: EntryKind) -> Vec<std::path::PathBuf> {
        self.imports.borrow().chain(project, kind)
    }

    /// Depth of the logical context stack
    pub fn context_depth(&self) -> usize {
        self.contexts.borrow().depth()
    }

    /// Enter `project`'s directory scope, make its import recorder current
    /// and activate `context` on the hook. The returned guard undoes all
    /// three on drop, restoring whatever configuration the stack then
    /// requires.
    pub(crate) fn activate(
        &self,
        key: &str,
        context: &CompilationContext,
        project: &Project,
    ) -> Result<ActivationGuard> {
        self.scopes.borrow_mut().enter(project.root());
        let token = self
            .imports
            .borrow_mut()
            .push(project.name(), project.kind());
        let outcome =
            self.contexts
                .borrow_mut()
                .push(key, context, project.options().ignore.clone());

        // Built before touching the loader, so a failed registration still
        // unwinds the scope, recorder and stack entries.
        let guard = ActivationGuard::new(
            self.loader.clone(),
            self.scopes.clone(),
            self.imports.clone(),
            self.contexts.clone(),
            project.root().to_path_buf(),
            token,
            outcome != PushOutcome::Noop,
        );

        match outcome {
            PushOutcome::Noop => {}
            PushOutcome::Reused => {
                let saved = self.contexts.borrow().saved_extensions(key);
                match (context.engine, saved) {
                    (EngineKind::Transform, Some(table)) => {
                        debug!(key, "reinstating remembered hook state");
                        self.loader.set_extensions(table);
                    }
                    _ => self.register_engine(key, context)?,
                }
            }
            PushOutcome::New => {
                let pristine = self.contexts.borrow().base_extensions().is_none();
                if pristine {
                    let table = self.loader.extensions();
                    self.contexts.borrow_mut().set_base_extensions(table);
                }
                self.register_engine(key, context)?;
            }
        }

        Ok(guard)
    }

    fn register_engine(&self, key: &str, context: &CompilationContext) -> Result<()> {
        let probe = Rc::new(HookProbe::new(
            self.scopes.clone(),
            self.imports.clone(),
            self.contexts.clone(),
        ));
        debug!(key, engine = %context.engine, "registering compilation engine");
        self.loader.register(context.engine, &context.options, probe)?;
        let table = self.loader.extensions();
        self.contexts.borrow_mut().save_extensions(key, table);
        Ok(())
    }
}
