//! In-memory host doubles for tests.
//!
//! Enabled for this crate's own tests and, through the `test-utils` feature,
//! for dependent crates. Every double records the calls it receives and can be
//! told to fail or panic on a given operation.

mod memory;

pub use memory::{
    package, MemoryCoreHost, MemoryDatabaseHost, MemoryPluginHost, MemoryThemeHost,
    MemoryTranslationHost, MemoryUpgrader, MemoryWhiteLabelSource,
};
