//! In-memory owner of the parsed configuration

use crate::models::config_value::{ConfigMap, ConfigValue};
use arc_swap::ArcSwap;
use std::sync::{Arc, Once, OnceLock, Weak};

/// Performs the first load from disk when the store is read for the first time
pub trait InitialLoad: Send + Sync {
    fn load_initial(&self);
}

/// Shared configuration snapshot.
///
/// Readers get an `Arc` to an immutable mapping and never block; the monitor
/// swaps in a whole new mapping after each successful load or repair.
pub struct ConfigStore {
    current: ArcSwap<ConfigMap>,
    first_access: Once,
    loader: OnceLock<Weak<dyn InitialLoad>>,
}

impl ConfigStore {
    /// Create a store holding `initial` until the first load replaces it
    pub fn new(initial: ConfigMap) -> Self {
        Self {
            current: ArcSwap::from_pointee(initial),
            first_access: Once::new(),
            loader: OnceLock::new(),
        }
    }

    /// Current configuration. The first call loads the file through the
    /// registered loader; later calls return the latest snapshot.
    pub fn config(&self) -> Arc<ConfigMap> {
        self.first_access.call_once(|| {
            if let Some(loader) = self.loader.get().and_then(Weak::upgrade) {
                loader.load_initial();
            }
        });
        self.current.load_full()
    }

    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        self.config().get(key).cloned()
    }

    /// Snapshot without triggering the initial load
    pub fn peek(&self) -> Arc<ConfigMap> {
        self.current.load_full()
    }

    pub(crate) fn replace(&self, config: ConfigMap) {
        self.current.store(Arc::new(config));
    }

    pub(crate) fn set_loader(&self, loader: Weak<dyn InitialLoad>) {
        let _ = self.loader.set(loader);
    }
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("config", &self.current.load())
            .finish()
    }
}
