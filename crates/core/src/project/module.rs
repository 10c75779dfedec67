//! Cached evaluation result for one (project root, entry kind)

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use crate::interfaces::SourceLoader;
use crate::types::ModuleValue;

/// Holds the resolved entry-point path and, once compilation completes, the
/// finalized module value. Shared by every Project instance derived for the
/// same (root, kind), so a re-derived Project with fresh settings still sees
/// the compilation that already happened.
#[derive(Debug, Default)]
pub struct ProjectModule {
    require_path: RefCell<Option<PathBuf>>,
    value: RefCell<Option<ModuleValue>>,
    finalized: RefCell<bool>,
}

impl ProjectModule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require_path(&self) -> Option<PathBuf> {
        self.require_path.borrow().clone()
    }

    pub(crate) fn set_require_path(&self, path: PathBuf) {
        *self.require_path.borrow_mut() = Some(path);
    }

    pub fn value(&self) -> Option<ModuleValue> {
        self.value.borrow().clone()
    }

    /// Whether this module holds a finalized value that is still backed by
    /// a live loader record. Hosts evict records between incremental
    /// rebuilds; an evicted record silently un-finalizes the module so the
    /// next request recompiles.
    pub fn finalized(&self, loader: &dyn SourceLoader) -> bool {
        if !*self.finalized.borrow() {
            return false;
        }
        match self.require_path.borrow().as_deref() {
            Some(path) if loader.has_record(path) => true,
            _ => {
                *self.finalized.borrow_mut() = false;
                false
            }
        }
    }

    pub(crate) fn finalize(&self, value: ModuleValue) {
        *self.value.borrow_mut() = Some(value);
        *self.finalized.borrow_mut() = true;
    }

    /// Whether `path` is the entry point this module was resolved from
    pub fn is_entry(&self, path: &Path) -> bool {
        self.require_path
            .borrow()
            .as_deref()
            .is_some_and(|p| p == path)
    }
}
