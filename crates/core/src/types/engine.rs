use serde::{Deserialize, Serialize};

/// Which on-demand compilation engine a context uses
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineKind {
    /// Full-program type-stripping engine. Its registration step is not
    /// cheaply reversible, so restoring it means registering again.
    TypeStrip,
    /// Incremental single-file transform engine. Restoring it substitutes
    /// the saved loader-extension table directly.
    #[default]
    Transform,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::TypeStrip => write!(f, "type-strip"),
            EngineKind::Transform => write!(f, "transform"),
        }
    }
}
