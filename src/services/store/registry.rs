//! Identifier → store map for hosts that keep several packs loaded at once.
//!
//! The registry is an ordinary value owned by the caller and passed to
//! whoever needs a store; nothing here is global.

use super::nyafile_store::NyaFileStore;
use crate::services::config::StoreConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub struct NyaFileRegistry {
    base_config: StoreConfig,
    stores: Mutex<HashMap<String, Arc<NyaFileStore>>>,
}

impl NyaFileRegistry {
    /// New stores copy `base_config` with their own identifier.
    pub fn new(base_config: StoreConfig) -> Self {
        Self {
            base_config,
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// The store registered under `identifier`, created on first request.
    pub fn get_or_create(&self, identifier: &str) -> Arc<NyaFileStore> {
        let mut stores = self.stores();
        if let Some(store) = stores.get(identifier) {
            return Arc::clone(store);
        }

        log::debug!("Creating nyafile store '{identifier}'");
        let config = self.base_config.clone().with_identifier(identifier);
        let store = Arc::new(NyaFileStore::new(config));
        stores.insert(identifier.to_string(), Arc::clone(&store));
        store
    }

    pub fn get(&self, identifier: &str) -> Option<Arc<NyaFileStore>> {
        self.stores().get(identifier).cloned()
    }

    /// Forget `identifier`. The store is torn down once its last `Arc` drops.
    pub fn remove(&self, identifier: &str) -> Option<Arc<NyaFileStore>> {
        self.stores().remove(identifier)
    }

    pub fn identifiers(&self) -> Vec<String> {
        let mut identifiers: Vec<String> = self.stores().keys().cloned().collect();
        identifiers.sort();
        identifiers
    }

    fn stores(&self) -> MutexGuard<'_, HashMap<String, Arc<NyaFileStore>>> {
        self.stores.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for NyaFileRegistry {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}
