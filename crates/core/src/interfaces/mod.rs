//! Trait seams for host-environment collaborators

mod source_loader;

pub use source_loader::{ExtensionTable, FileProbe, PackageManifest, SourceLoader};
