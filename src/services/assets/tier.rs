use super::object_url::ObjectUrlRegistry;
use super::record::AssetRecord;
use crate::services::archive::RawEntry;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Which of the two packs a table belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// User supplied pack, consulted first.
    Skin,
    /// Bundled pack, used when the skin lacks a key.
    Default,
}

impl Tier {
    pub fn from_is_default(is_default: bool) -> Self {
        if is_default {
            Self::Default
        } else {
            Self::Skin
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Skin => f.write_str("skin"),
            Tier::Default => f.write_str("default"),
        }
    }
}

/// Logical key for an archive path.
///
/// The extension of the file name is dropped (`assets/spinner.png` →
/// `assets/spinner`). A file whose stem is purely numeric is a numbered
/// variant of its parent folder (`spinner/2.gif` → `spinner`). A leading dot
/// in the file name is not an extension.
///
/// Named files are never folded: `spinner/idle.png` is `spinner/idle`, not a
/// candidate for `spinner`.
pub fn asset_key(path: &str) -> &str {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    let stem = match path[name_start..].rfind('.') {
        Some(dot) if dot > 0 => &path[..name_start + dot],
        _ => path,
    };

    let file_stem = &stem[name_start..];
    let is_numbered_variant =
        name_start > 1 && !file_stem.is_empty() && file_stem.bytes().all(|b| b.is_ascii_digit());

    if is_numbered_variant {
        &path[..name_start - 1]
    } else {
        stem
    }
}

/// All records of one loaded pack, grouped by asset key.
///
/// Built in one go from decoded entries and never mutated afterwards; a
/// reload builds a new table and swaps it in whole.
#[derive(Debug)]
pub struct TierTable {
    tier: Tier,
    assets: HashMap<String, Vec<Arc<AssetRecord>>>,
    entry_count: usize,
}

impl TierTable {
    pub fn empty(tier: Tier) -> Self {
        Self {
            tier,
            assets: HashMap::new(),
            entry_count: 0,
        }
    }

    /// Group entries by key, keeping archive order inside each group.
    pub fn build(tier: Tier, entries: Vec<RawEntry>) -> Self {
        let entry_count = entries.len();
        let mut assets: HashMap<String, Vec<Arc<AssetRecord>>> = HashMap::new();

        for RawEntry { path, payload } in entries {
            let key = asset_key(&path).to_string();
            assets
                .entry(key)
                .or_default()
                .push(Arc::new(AssetRecord::new(path, payload)));
        }

        Self {
            tier,
            assets,
            entry_count,
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Candidates for `key`, or `None` when the table has none.
    pub fn candidates(&self, key: &str) -> Option<&[Arc<AssetRecord>]> {
        self.assets
            .get(key)
            .map(Vec::as_slice)
            .filter(|candidates| !candidates.is_empty())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.assets.keys().map(String::as_str)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.assets.values().flatten().map(|record| record.path())
    }

    pub fn records(&self) -> impl Iterator<Item = &Arc<AssetRecord>> {
        self.assets.values().flatten()
    }

    pub fn key_count(&self) -> usize {
        self.assets.len()
    }

    pub fn entry_count(&self) -> usize {
        self.entry_count
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Release every object URL owned by this table's records.
    /// Returns how many live handles were revoked.
    pub fn dispose(&self, registry: &ObjectUrlRegistry) -> usize {
        self.records()
            .filter(|record| record.release(registry))
            .count()
    }
}
