use std::io;
use std::path::{Path, PathBuf};

use crate::types::EntryKind;

/// Errors that can occur during orchestration
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Resolution error: {0}")]
    Resolution(String),

    #[error("Failed to compile {kind} entry point at {}: {source}", root.display())]
    Compile {
        kind: EntryKind,
        root: PathBuf,
        #[source]
        source: Box<Error>,
    },

    #[error("Loader record missing for '{}'. This may indicate a serious issue", .0.display())]
    Invalidation(PathBuf),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a compilation failure with the entry point that was compiling
    pub(crate) fn compile_wrap(kind: EntryKind, root: &Path, source: Error) -> Error {
        Error::Compile {
            kind,
            root: root.to_path_buf(),
            source: Box::new(source),
        }
    }
}

/// Result type alias for orchestrator operations
pub type Result<T> = std::result::Result<T, Error>;
