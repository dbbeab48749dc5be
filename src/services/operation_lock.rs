//! Per-tier lock for pack loads.
//!
//! At most one load builds a table for a given tier at a time. Waiters are
//! served in arrival order (tokio's mutex is fair), so the last caller to
//! acquire the lock is the last to install. Loads of different tiers never
//! contend.

use crate::services::assets::Tier;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

struct TierSlot {
    lock: Arc<Mutex<()>>,
    busy: Arc<AtomicBool>,
}

impl TierSlot {
    fn new() -> Self {
        Self {
            lock: Arc::new(Mutex::new(())),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    fn hold(&self, guard: OwnedMutexGuard<()>) -> TierGuard {
        self.busy.store(true, Ordering::Release);
        TierGuard {
            busy: Arc::clone(&self.busy),
            _guard: guard,
        }
    }
}

/// Held for the duration of one load. Dropping it frees the tier.
pub struct TierGuard {
    busy: Arc<AtomicBool>,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for TierGuard {
    fn drop(&mut self) {
        // Cleared before the mutex guard field is dropped
        self.busy.store(false, Ordering::Release);
    }
}

pub struct OperationLock {
    skin: TierSlot,
    default: TierSlot,
}

impl OperationLock {
    pub fn new() -> Self {
        Self {
            skin: TierSlot::new(),
            default: TierSlot::new(),
        }
    }
}

impl Default for OperationLock {
    fn default() -> Self {
        Self::new()
    }
}

impl OperationLock {
    /// Wait until no other load of `tier` is in flight.
    pub async fn acquire(&self, tier: Tier) -> TierGuard {
        let slot = self.slot(tier);
        let guard = slot.lock.clone().lock_owned().await;
        slot.hold(guard)
    }

    /// Acquire without waiting. `None` if a load of `tier` is running.
    pub fn try_acquire(&self, tier: Tier) -> Option<TierGuard> {
        let slot = self.slot(tier);
        let guard = slot.lock.clone().try_lock_owned().ok()?;
        Some(slot.hold(guard))
    }

    /// Whether a guard for `tier` is currently held. Never takes the lock.
    pub fn is_held(&self, tier: Tier) -> bool {
        self.slot(tier).busy.load(Ordering::Acquire)
    }

    fn slot(&self, tier: Tier) -> &TierSlot {
        match tier {
            Tier::Skin => &self.skin,
            Tier::Default => &self.default,
        }
    }
}
