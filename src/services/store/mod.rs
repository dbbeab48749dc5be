//! The two-tier asset store, its pinned cache and the identifier registry.

mod nyafile_store;
pub mod preload;
mod registry;

// Re-export public API
pub use nyafile_store::{LoadSummary, NyaFileStore};
pub use preload::{PinnedValue, PreloadQueue};
pub use registry::NyaFileRegistry;

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod store_tests;
