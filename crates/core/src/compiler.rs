//! On-demand compilation of a project's entry point

use std::path::PathBuf;
use std::rc::Rc;

use tracing::debug;

use crate::context::CompilationContext;
use crate::error::{Error, Result};
use crate::project::Project;
use crate::state::OrchestratorState;
use crate::types::ModuleValue;

/// How a compilation obtains its module value
#[derive(Clone)]
pub enum InitValue {
    /// Resolve `request` relative to the project root and evaluate it
    Request(String),
    /// Already-resolved entry path
    Path(PathBuf),
    /// Produce the value directly; used when a plugin resolver stands in
    /// for an entry-point file
    Call(Rc<dyn Fn() -> Result<ModuleValue>>),
}

impl std::fmt::Debug for InitValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitValue::Request(r) => f.debug_tuple("Request").field(r).finish(),
            InitValue::Path(p) => f.debug_tuple("Path").field(p).finish(),
            InitValue::Call(_) => f.write_str("Call"),
        }
    }
}

/// Compiles one project's entry point under the project's compilation
/// context. Construction derives the context and its cache key from the
/// project settings; the loader is only touched during [`compile`].
///
/// [`compile`]: Compiler::compile
#[derive(Debug)]
pub struct Compiler {
    key: String,
    context: CompilationContext,
}

impl Compiler {
    pub(crate) fn new(project: &Project) -> Result<Self> {
        let options = project.options();
        let context = CompilationContext::new(
            options.engine.unwrap_or_default(),
            options.engine_options.clone(),
        );
        let key = context.cache_key(&options.ignore)?;
        Ok(Self { key, context })
    }

    /// Activate this compiler's context, evaluate the entry point, and
    /// deactivate again. The activation guard restores the previous hook
    /// configuration on every exit path.
    pub(crate) fn compile(
        &self,
        state: &OrchestratorState,
        project: &Project,
        init: InitValue,
    ) -> Result<ModuleValue> {
        let _guard = state.activate(&self.key, &self.context, project)?;
        debug!(
            root = %project.root().display(),
            kind = %project.kind(),
            "compiling entry point"
        );

        let path = match init {
            InitValue::Call(produce) => return produce(),
            InitValue::Path(path) => path,
            InitValue::Request(request) => match project.module().require_path() {
                Some(cached) => cached,
                None => state
                    .loader()
                    .resolve(project.root(), &request)
                    .ok_or_else(|| {
                        Error::Resolution(format!(
                            "cannot resolve entry point '{request}' in {}",
                            project.root().display()
                        ))
                    })?,
            },
        };
        project.module().set_require_path(path.clone());

        let value = state
            .loader()
            .evaluate(&path)
            .map_err(|err| Error::compile_wrap(project.kind(), project.root(), err))?;
        if !state.loader().has_record(&path) {
            return Err(Error::Invalidation(path));
        }
        Ok(value)
    }
}
