//! Workspace root; hosts the integration tests. The library surface lives
//! in `tsload-core`.

pub use tsload_core;
