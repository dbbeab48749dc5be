use super::preload::{PinFuture, PinnedValue, PreloadQueue};
use crate::services::archive;
use crate::services::assets::{
    AssetRecord, Blob, ObjectUrlRegistry, RandomSource, SeededRandom, ThreadRandom, Tier,
    TierTable,
};
use crate::services::config::{PinKind, StoreConfig, UrlMode};
use crate::services::operation_lock::OperationLock;
use crate::types::{AssetError, AssetResult};
use futures_util::future::{ready, FutureExt};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// Outcome of a successful [`NyaFileStore::load`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    pub tier: Tier,
    pub entries: usize,
    pub keys: usize,
    /// Object URLs of the replaced table that were revoked.
    pub released_handles: usize,
    /// Keys re-pinned against the new tier state.
    pub pinned: usize,
    /// First pin that failed to re-derive after the new table went live.
    pub refresh_error: Option<AssetError>,
}

/// Two-tier asset store: a skin pack shadowing a default pack.
///
/// Each tier is an immutable [`TierTable`] behind a lock that is only held
/// long enough to clone or swap the `Arc`, so a lookup sees either the whole
/// old table or the whole new one. Object URLs issued from a table are
/// revoked right after that table is replaced, and when the store is
/// disposed or dropped.
///
/// Installing a table and re-pinning against it happen under one pin lock,
/// which every other pin also takes around its lookup. A pin therefore
/// always resolves against the newest tables.
pub struct NyaFileStore {
    config: StoreConfig,
    skin: RwLock<Arc<TierTable>>,
    default: RwLock<Arc<TierTable>>,
    load_lock: OperationLock,
    pin_lock: Mutex<()>,
    random: Arc<dyn RandomSource>,
    object_urls: Arc<ObjectUrlRegistry>,
    pins: PreloadQueue,
}

impl NyaFileStore {
    pub fn new(config: StoreConfig) -> Self {
        let random: Arc<dyn RandomSource> = match config.seed {
            Some(seed) => Arc::new(SeededRandom::new(seed)),
            None => Arc::new(ThreadRandom),
        };
        Self::with_random_source(config, random)
    }

    /// Build a store that draws candidate picks from `random`.
    pub fn with_random_source(config: StoreConfig, random: Arc<dyn RandomSource>) -> Self {
        Self {
            config,
            skin: RwLock::new(Arc::new(TierTable::empty(Tier::Skin))),
            default: RwLock::new(Arc::new(TierTable::empty(Tier::Default))),
            load_lock: OperationLock::new(),
            pin_lock: Mutex::new(()),
            random,
            object_urls: Arc::new(ObjectUrlRegistry::new()),
            pins: PreloadQueue::new(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.config.identifier
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn object_urls(&self) -> &ObjectUrlRegistry {
        &self.object_urls
    }

    /// Current table of `tier`.
    pub fn tier(&self, tier: Tier) -> Arc<TierTable> {
        Arc::clone(&self.tier_slot(tier).read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Whether a load of `tier` is in flight.
    pub fn is_loading(&self, tier: Tier) -> bool {
        self.load_lock.is_held(tier)
    }

    // ─── Loading ───────────────────────────────────────────────────────

    /// Decode `bytes` and install it as the default (`is_default`) or skin tier.
    pub async fn load(&self, bytes: Vec<u8>, is_default: bool) -> AssetResult<LoadSummary> {
        self.load_tier(bytes, Tier::from_is_default(is_default)).await
    }

    /// Decode, build, swap and re-pin, then release the old handles.
    ///
    /// A decode failure leaves both tiers untouched. Loads of the same tier
    /// are serialized; the last one to run is the one left installed.
    pub async fn load_tier(&self, bytes: Vec<u8>, tier: Tier) -> AssetResult<LoadSummary> {
        let guard = self.load_lock.acquire(tier).await;

        let entries = archive::decode_archive_async(bytes).await.map_err(|e| {
            warn!("[{}] Failed to load {tier} pack: {e}", self.identifier());
            e
        })?;

        let table = Arc::new(TierTable::build(tier, entries));
        let (entry_count, key_count) = (table.entry_count(), table.key_count());
        // Pins move to the new table before the old one gives up its handles
        let (previous, pinned) = {
            let pins = self.pin_guard();
            let previous = self.install(tier, table);
            info!(
                "[{}] Installed {tier} pack: {entry_count} entries, {key_count} keys",
                self.identifier()
            );
            (previous, self.repin_locked(&pins))
        };

        let released_handles = previous.dispose(&self.object_urls);
        debug!(
            "[{}] Released {released_handles} object URLs from previous {tier} pack",
            self.identifier()
        );
        drop(guard);

        let refresh_error = self.pins.await_all().await.err();

        Ok(LoadSummary {
            tier,
            entries: entry_count,
            keys: key_count,
            released_handles,
            pinned,
            refresh_error,
        })
    }

    /// Release every handle of both tiers and drop all pins.
    /// The store stays usable with empty tiers. Returns the number of revoked URLs.
    pub fn dispose(&self) -> usize {
        let _pins = self.pin_guard();
        self.pins.clear();
        [Tier::Skin, Tier::Default]
            .into_iter()
            .map(|tier| {
                self.install(tier, Arc::new(TierTable::empty(tier)))
                    .dispose(&self.object_urls)
            })
            .sum()
    }

    fn install(&self, tier: Tier, table: Arc<TierTable>) -> Arc<TierTable> {
        let mut slot = self
            .tier_slot(tier)
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, table)
    }

    fn tier_slot(&self, tier: Tier) -> &RwLock<Arc<TierTable>> {
        match tier {
            Tier::Skin => &self.skin,
            Tier::Default => &self.default,
        }
    }

    // ─── Lookup ────────────────────────────────────────────────────────

    /// Pick one candidate for `key`: skin first, then default.
    ///
    /// Every call re-rolls among the tier's candidates.
    pub fn lookup(&self, key: &str) -> AssetResult<Arc<AssetRecord>> {
        for tier in [Tier::Skin, Tier::Default] {
            let table = self.tier(tier);
            if let Some(candidates) = table.candidates(key) {
                let index = self.random.pick(candidates.len()).min(candidates.len() - 1);
                return Ok(Arc::clone(&candidates[index]));
            }
        }
        Err(AssetError::NotFound(key.to_string()))
    }

    pub async fn get_blob(&self, key: &str) -> AssetResult<Blob> {
        Ok(self.lookup(key)?.blob())
    }

    pub fn get_type(&self, key: &str) -> AssetResult<&'static str> {
        Ok(self.lookup(key)?.mime())
    }

    pub async fn get_text(&self, key: &str) -> AssetResult<Arc<str>> {
        decode_text(self.lookup(key)?).await
    }

    pub async fn get_json(&self, key: &str) -> AssetResult<serde_json::Value> {
        self.get_json_as(key).await
    }

    pub async fn get_json_as<T: DeserializeOwned>(&self, key: &str) -> AssetResult<T> {
        let text = self.get_text(key).await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Locator for the payload, per the configured [`UrlMode`].
    pub async fn get_url(&self, key: &str) -> AssetResult<Arc<str>> {
        materialize_url(self.lookup(key)?, self.config.url_mode, &self.object_urls).await
    }

    /// Every asset key of both tiers, deduplicated and sorted.
    pub fn list_keys(&self) -> Vec<String> {
        let (skin, default) = (self.tier(Tier::Skin), self.tier(Tier::Default));
        let keys: BTreeSet<&str> = skin.keys().chain(default.keys()).collect();
        keys.into_iter().map(str::to_string).collect()
    }

    /// Every raw entry path of both tiers, deduplicated and sorted.
    pub fn list_files(&self) -> Vec<String> {
        let (skin, default) = (self.tier(Tier::Skin), self.tier(Tier::Default));
        let paths: BTreeSet<&str> = skin.paths().chain(default.paths()).collect();
        paths.into_iter().map(str::to_string).collect()
    }

    // ─── Pinning ───────────────────────────────────────────────────────

    /// Pin `key` with the configured default kind.
    pub fn pin(&self, key: &str) {
        self.pin_as(key, self.config.default_pin_kind);
    }

    /// Resolve `key` now and start deriving `kind` for it under a stable slot.
    pub fn pin_as(&self, key: &str, kind: PinKind) {
        self.start_pin(key, kind);
    }

    pub fn unpin(&self, key: &str) -> bool {
        self.pins.remove(key)
    }

    pub fn pinned_keys(&self) -> Vec<(String, PinKind)> {
        self.pins.pinned()
    }

    pub async fn await_all(&self) -> AssetResult<()> {
        self.pins.await_all().await
    }

    /// Re-pin every pinned key against the current tiers and wait for all of them.
    pub async fn refresh_all(&self) -> AssetResult<()> {
        let count = self.repin_all();
        info!(
            "[{}] Full refreshing cache with {count} assets",
            self.identifier()
        );
        self.pins.await_all().await
    }

    pub fn get_pinned(&self, key: &str) -> AssetResult<PinnedValue> {
        self.pins.get(key)
    }

    pub fn get_pinned_json(&self, key: &str) -> AssetResult<serde_json::Value> {
        let value = self.pins.get(key)?;
        Ok(serde_json::from_str(value.as_str())?)
    }

    /// Pinned URL for `key`, pinning it first if needed.
    pub async fn get_url_cached(&self, key: &str) -> AssetResult<Arc<str>> {
        self.cached_or_pin(key, PinKind::DataUrl)
            .await
            .map(PinnedValue::into_inner)
    }

    /// Pinned text for `key`, pinning it first if needed.
    pub async fn get_text_cached(&self, key: &str) -> AssetResult<Arc<str>> {
        self.cached_or_pin(key, PinKind::Text)
            .await
            .map(PinnedValue::into_inner)
    }

    async fn cached_or_pin(&self, key: &str, kind: PinKind) -> AssetResult<PinnedValue> {
        match self.pins.slot(key) {
            Some((pinned_kind, future)) if pinned_kind == kind => future.await,
            // Pinned as something else: answer without clobbering that pin
            Some(_) => self.derive(key, kind)?.await,
            None => self.start_pin(key, kind).await,
        }
    }

    fn start_pin(&self, key: &str, kind: PinKind) -> PinFuture {
        let pins = self.pin_guard();
        self.pin_locked(&pins, key, kind)
    }

    /// Lookup and insert as one step; `_pins` proves the pin lock is held.
    fn pin_locked(&self, _pins: &MutexGuard<'_, ()>, key: &str, kind: PinKind) -> PinFuture {
        let derivation = match self.derive(key, kind) {
            Ok(derivation) => derivation,
            Err(e) => ready(Err(e)).boxed(),
        };
        self.pins.insert(key, kind, derivation)
    }

    fn repin_all(&self) -> usize {
        let pins = self.pin_guard();
        self.repin_locked(&pins)
    }

    fn repin_locked(&self, pins: &MutexGuard<'_, ()>) -> usize {
        let pinned = self.pins.pinned();
        for (key, kind) in &pinned {
            self.pin_locked(pins, key, *kind);
        }
        pinned.len()
    }

    fn pin_guard(&self) -> MutexGuard<'_, ()> {
        self.pin_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Resolve `key` now; the returned future only derives the representation.
    fn derive(
        &self,
        key: &str,
        kind: PinKind,
    ) -> AssetResult<futures_util::future::BoxFuture<'static, AssetResult<PinnedValue>>> {
        let record = self.lookup(key)?;
        let url_mode = self.config.url_mode;
        let registry = Arc::clone(&self.object_urls);

        Ok(async move {
            match kind {
                PinKind::DataUrl => materialize_url(record, url_mode, &registry)
                    .await
                    .map(PinnedValue::Url),
                PinKind::Text => decode_text(record).await.map(PinnedValue::Text),
            }
        }
        .boxed())
    }
}

impl Default for NyaFileStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl Drop for NyaFileStore {
    fn drop(&mut self) {
        let released = self.dispose();
        if released > 0 {
            debug!(
                "[{}] Released {released} object URLs on teardown",
                self.identifier()
            );
        }
    }
}

async fn decode_text(record: Arc<AssetRecord>) -> AssetResult<Arc<str>> {
    if record.is_text_ready() {
        return record.text();
    }
    tokio::task::spawn_blocking(move || record.text()).await?
}

async fn materialize_url(
    record: Arc<AssetRecord>,
    url_mode: UrlMode,
    registry: &ObjectUrlRegistry,
) -> AssetResult<Arc<str>> {
    if url_mode == UrlMode::ObjectUrl {
        if let Some(url) = record.object_url(registry) {
            return Ok(url);
        }
        // Table was replaced while this derivation was in flight
        debug!("{} already released, using a data URL", record.path());
    }

    if record.is_data_url_ready() {
        return Ok(record.data_url());
    }
    Ok(tokio::task::spawn_blocking(move || record.data_url()).await?)
}
