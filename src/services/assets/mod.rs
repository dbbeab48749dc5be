//! Loaded pack contents: records, per-tier tables and the handles they own.

pub mod object_url;
pub mod random;
mod record;
mod tier;

// Re-export public API
pub use object_url::{Blob, ObjectUrlRegistry};
pub use random::{RandomSource, SeededRandom, ThreadRandom};
pub use record::AssetRecord;
pub use tier::{asset_key, Tier, TierTable};

#[cfg(test)]
#[path = "tests/record_tests.rs"]
mod record_tests;

#[cfg(test)]
#[path = "tests/tier_tests.rs"]
mod tier_tests;
