//! In-memory loader for themeable asset packs ("nyafiles").
//!
//! A pack is a zip archive of images, audio, text, JSON and fonts. A
//! [`NyaFileStore`] holds a default pack and an optional skin pack; lookups
//! consult the skin first and fall back to the default.

pub mod services;
pub mod types;
#[cfg(test)]
pub mod test_utils;

pub use services::assets::{Blob, RandomSource, Tier};
pub use services::config::{PinKind, StoreConfig, UrlMode};
pub use services::store::{LoadSummary, NyaFileRegistry, NyaFileStore, PinnedValue};
pub use types::{AssetError, AssetResult};
