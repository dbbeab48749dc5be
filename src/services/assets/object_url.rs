//! Allocator for `blob:` style locators that stand in for browser object URLs.
//!
//! A registry hands out opaque URLs backed by a [`Blob`]. The URL stays
//! resolvable until it is revoked; every URL is revoked at most once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

pub const OBJECT_URL_PREFIX: &str = "blob:nyafile/";

/// Raw payload plus its content type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub data: Arc<[u8]>,
    pub mime: &'static str,
}

impl Blob {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ObjectUrlRegistry {
    live: Mutex<HashMap<String, Blob>>,
}

impl ObjectUrlRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh URL for `blob`.
    pub fn create(&self, blob: Blob) -> String {
        let url = format!("{OBJECT_URL_PREFIX}{}", Uuid::new_v4());
        self.live_map().insert(url.clone(), blob);
        url
    }

    /// Look up the blob behind a live URL. `None` once revoked.
    pub fn resolve(&self, url: &str) -> Option<Blob> {
        self.live_map().get(url).cloned()
    }

    /// Release a URL. Returns `false` if it was not live.
    pub fn revoke(&self, url: &str) -> bool {
        self.live_map().remove(url).is_some()
    }

    /// Number of URLs that have been created and not yet revoked.
    pub fn live_count(&self) -> usize {
        self.live_map().len()
    }

    fn live_map(&self) -> std::sync::MutexGuard<'_, HashMap<String, Blob>> {
        self.live.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
