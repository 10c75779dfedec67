//! Directory scope tracking for the compilation hook
//!
//! Classifies file paths as belonging to an actively compiling project
//! directory or not, so the module-loading hook knows whether to run the
//! active engine on a file or pass it through untouched.

use std::path::{Path, PathBuf};

/// Vendored-dependency subtree, excluded from scope unless the file is a
/// typed source placed there on purpose.
const VENDOR_DIR: &str = "node_modules";

/// Framework artifact directory, always excluded so generated output never
/// feeds back into the compiler.
const CACHE_DIR: &str = ".cache";

const SOURCE_EXTENSIONS: [&str; 2] = ["ts", "tsx"];

/// Tracks which directories are currently being compiled.
///
/// Nested compilations can re-enter the same root, so entries form a
/// multiset rather than a set: entering twice requires exiting twice.
#[derive(Debug, Default)]
pub struct ScopeGuard {
    entered: Vec<PathBuf>,
}

impl ScopeGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&mut self, dir: &Path) {
        self.entered.push(dir.to_path_buf());
    }

    /// Remove one matching entry, most recently added first
    pub fn exit(&mut self, dir: &Path) {
        if let Some(idx) = self.entered.iter().rposition(|d| d == dir) {
            self.entered.remove(idx);
        }
    }

    pub fn depth(&self) -> usize {
        self.entered.len()
    }

    /// Whether `path` belongs to a directory that is actively compiling
    pub fn is_in_scope(&self, path: &Path) -> bool {
        if Self::has_component(path, CACHE_DIR) {
            return false;
        }
        if !self.entered.iter().any(|dir| path.starts_with(dir)) {
            return false;
        }
        if Self::has_component(path, VENDOR_DIR) {
            return Self::is_typed_source(path);
        }
        true
    }

    fn has_component(path: &Path, name: &str) -> bool {
        path.components().any(|c| c.as_os_str() == name)
    }

    fn is_typed_source(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
    }
}
