use super::types::RawEntry;
use crate::types::{AssetError, AssetResult};
use std::collections::HashMap;
use std::io::{Cursor, Read};

/// Upper bound on how much a single entry may reserve before reading.
const MAX_PREALLOC: u64 = 16 * 1024 * 1024;
/// Deflate rarely beats this ratio on real assets.
const MAX_INFLATE_RATIO: u64 = 64;

/// Inflate a whole zip archive held in memory.
///
/// Directory markers are dropped. Entries keep archive order; if the same
/// path occurs twice the later payload replaces the earlier one in place.
/// On failure nothing is returned, there is no partial result.
pub fn decode_archive(bytes: &[u8]) -> AssetResult<Vec<RawEntry>> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))?;

    let mut entries: Vec<RawEntry> = Vec::with_capacity(archive.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let path = entry.name().to_string();

        if entry.is_dir() || is_directory_marker(&path) {
            continue;
        }

        let mut payload = Vec::with_capacity(reservation(entry.size(), entry.compressed_size()));
        entry
            .read_to_end(&mut payload)
            .map_err(|e| AssetError::Decode(format!("Failed to read entry {path}: {e}")))?;

        match positions.get(&path) {
            Some(&index) => {
                log::warn!("Duplicate archive entry {path}, keeping the later payload");
                entries[index].payload = payload;
            }
            None => {
                positions.insert(path.clone(), entries.len());
                entries.push(RawEntry { path, payload });
            }
        }
    }

    Ok(entries)
}

/// Decode on the blocking pool. Resolves exactly once with the full entry
/// list or the decode error.
pub async fn decode_archive_async(bytes: Vec<u8>) -> AssetResult<Vec<RawEntry>> {
    tokio::task::spawn_blocking(move || decode_archive(&bytes)).await?
}

/// Sizes in the central directory are untrusted; the payload grows past
/// this reservation as needed.
fn reservation(declared: u64, compressed: u64) -> usize {
    let bound = compressed
        .saturating_mul(MAX_INFLATE_RATIO)
        .min(MAX_PREALLOC);
    usize::try_from(declared.min(bound)).unwrap_or(0)
}

fn is_directory_marker(path: &str) -> bool {
    path.ends_with('/') || path.ends_with('\\')
}
