mod engine;
mod entry_kind;
mod module_value;
mod plugin;
mod prop_bag;

pub use engine::EngineKind;
pub use entry_kind::EntryKind;
pub use module_value::{EntryFn, EntryPointFn, ModuleValue, PluginManifest, PublicContext};
pub use plugin::{PluginRef, PluginSpec};
pub use prop_bag::PropertyBag;
