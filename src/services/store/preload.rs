//! Key-pinned cache of derived representations.
//!
//! A pin stores one shared derivation per key. The derivation starts on the
//! tokio runtime as soon as it is pinned, and every reader (sync peek or
//! async await) observes the same single result. Pins are independent of the
//! per-lookup candidate re-roll: once a key is pinned its value is stable
//! until it is re-pinned.

use crate::services::config::PinKind;
use crate::types::{AssetError, AssetResult};
use futures_util::future::{join_all, BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A completed pinned value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinnedValue {
    Url(Arc<str>),
    Text(Arc<str>),
}

impl PinnedValue {
    pub fn kind(&self) -> PinKind {
        match self {
            PinnedValue::Url(_) => PinKind::DataUrl,
            PinnedValue::Text(_) => PinKind::Text,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            PinnedValue::Url(value) | PinnedValue::Text(value) => value,
        }
    }

    pub fn into_inner(self) -> Arc<str> {
        match self {
            PinnedValue::Url(value) | PinnedValue::Text(value) => value,
        }
    }
}

pub type PinFuture = Shared<BoxFuture<'static, AssetResult<PinnedValue>>>;

struct PinSlot {
    kind: PinKind,
    future: PinFuture,
}

#[derive(Default)]
pub struct PreloadQueue {
    slots: Mutex<HashMap<String, PinSlot>>,
}

impl PreloadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the pin for `key` and start driving `derivation` immediately.
    ///
    /// Outside a tokio runtime the derivation runs on first await instead.
    pub fn insert(
        &self,
        key: &str,
        kind: PinKind,
        derivation: BoxFuture<'static, AssetResult<PinnedValue>>,
    ) -> PinFuture {
        let future = derivation.shared();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(future.clone());
        }

        self.slots().insert(
            key.to_string(),
            PinSlot {
                kind,
                future: future.clone(),
            },
        );
        future
    }

    pub fn is_pinned(&self, key: &str) -> bool {
        self.slots().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    /// Pinned keys with their kinds, sorted by key.
    pub fn pinned(&self) -> Vec<(String, PinKind)> {
        let mut pinned: Vec<(String, PinKind)> = self
            .slots()
            .iter()
            .map(|(key, slot)| (key.clone(), slot.kind))
            .collect();
        pinned.sort_by(|a, b| a.0.cmp(&b.0));
        pinned
    }

    pub fn slot(&self, key: &str) -> Option<(PinKind, PinFuture)> {
        self.slots()
            .get(key)
            .map(|slot| (slot.kind, slot.future.clone()))
    }

    /// Synchronous read of a finished pin.
    ///
    /// Fails with `NotCached` if `key` was never pinned or is still deriving;
    /// a finished derivation that failed returns its own error.
    pub fn get(&self, key: &str) -> AssetResult<PinnedValue> {
        let slots = self.slots();
        let slot = slots
            .get(key)
            .ok_or_else(|| AssetError::NotCached(key.to_string()))?;

        match slot.future.peek() {
            Some(result) => result.clone(),
            None => Err(AssetError::NotCached(key.to_string())),
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        self.slots().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.slots().clear();
    }

    /// Wait for every current pin to finish.
    ///
    /// All derivations run to completion; the first failure in key order is
    /// returned once they have.
    pub async fn await_all(&self) -> AssetResult<()> {
        let mut pending: Vec<(String, PinFuture)> = self
            .slots()
            .iter()
            .map(|(key, slot)| (key.clone(), slot.future.clone()))
            .collect();
        pending.sort_by(|a, b| a.0.cmp(&b.0));

        let results = join_all(pending.iter().map(|(_, future)| future.clone())).await;

        let mut first_error = None;
        for ((key, _), result) in pending.iter().zip(results) {
            if let Err(e) = result {
                log::warn!("Pinned asset {key} failed: {e}");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, PinSlot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "tests/preload_tests.rs"]
mod tests;
