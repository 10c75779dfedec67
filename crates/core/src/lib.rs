//! tsload-core - Recursive compilation orchestration for typed entry points
//!
//! This crate provides functionality to:
//! - Compile statically-typed project entry points on demand through an
//!   injected module loader
//! - Stack compilation contexts so nested projects compile under their own
//!   engine configuration and the outer one is restored afterwards
//! - Record import chains per project and entry kind, including chains of
//!   discovered extensions
//! - Cache projects, settings and compiled modules first-request-wins
pub mod compiler;
pub mod context;
pub mod entry;
pub mod error;
pub mod imports;
pub mod interfaces;
pub mod plugins;
pub mod project;
pub mod scope;
pub mod state;
pub mod types;

// Re-export commonly used types and traits
pub use error::{Error, Result};
pub use types::*;

// Re-export main API components
pub use compiler::InitValue;
pub use context::{ActivationGuard, CompilationContext, ContextStack};
pub use entry::{process_entry_point, EntryArgs};
pub use imports::{ImportChainRecorder, ImportView};
pub use interfaces::{ExtensionTable, FileProbe, PackageManifest, SourceLoader};
pub use plugins::include_plugins;
pub use project::{
    ApiOptions, Project, ProjectDescriptor, ProjectMeta, ProjectOptions, ProjectRegistry,
    ProjectSettings,
};
pub use scope::ScopeGuard;
pub use state::OrchestratorState;
