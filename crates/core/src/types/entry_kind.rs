use serde::{Deserialize, Serialize};

/// Which unit of a project root an operation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EntryKind {
    /// The main configuration entry point (`site-config`)
    Primary,
    /// The lifecycle-hook entry point (`site-node`)
    Companion,
}

impl EntryKind {
    /// All entry kinds a plugin directory may provide, in processing order
    pub const ALL: [EntryKind; 2] = [EntryKind::Primary, EntryKind::Companion];

    /// File stem the host framework expects for this kind
    pub fn file_stem(&self) -> &'static str {
        match self {
            EntryKind::Primary => "site-config",
            EntryKind::Companion => "site-node",
        }
    }

    /// The sibling kind whose settings a lookup may transparently reuse
    pub fn fallback(&self) -> EntryKind {
        match self {
            EntryKind::Primary => EntryKind::Companion,
            EntryKind::Companion => EntryKind::Primary,
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryKind::Primary => write!(f, "primary"),
            EntryKind::Companion => write!(f, "companion"),
        }
    }
}
