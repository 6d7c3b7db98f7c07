//! Provider registry
//!
//! Maps provider identifiers to adapters. Reads are lock-free: each lookup
//! loads the current immutable snapshot. Writers are serialized by a mutex
//! and publish a new snapshot, so calls already in flight keep the adapter
//! they resolved even if it is replaced or removed meanwhile.

use super::adapter::{Adapter, HttpAdapter};
use crate::config::NailConfig;
use crate::error::{NailError, NailResult};
use crate::transport::Transport;
use arc_swap::{ArcSwap, ArcSwapOption};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::info;

/// Opaque provider identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for ProviderId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ProviderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProviderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ProviderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

type AdapterMap = HashMap<ProviderId, Arc<dyn Adapter>>;

/// Registry of adapters keyed by provider identifier
pub struct ProviderRegistry {
    adapters: ArcSwap<AdapterMap>,
    write_lock: Mutex<()>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            adapters: ArcSwap::from_pointee(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    /// Build a registry holding an [`HttpAdapter`] for every enabled provider
    pub fn from_config(config: &NailConfig, transport: Arc<dyn Transport>) -> NailResult<Self> {
        let registry = Self::new();
        for provider in config.enabled_providers() {
            let adapter = HttpAdapter::from_config(provider, &config.connection, Arc::clone(&transport));
            registry.register(provider.id.as_str(), Arc::new(adapter))?;
        }
        Ok(registry)
    }

    /// Apply `change` to a private copy of the map and publish it
    fn update<T>(&self, change: impl FnOnce(&mut AdapterMap) -> T) -> T {
        let _guard = match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut next = AdapterMap::clone(&self.adapters.load());
        let result = change(&mut next);
        self.adapters.store(Arc::new(next));
        result
    }

    /// Register an adapter; fails if the identifier is taken
    pub fn register(&self, id: impl Into<ProviderId>, adapter: Arc<dyn Adapter>) -> NailResult<()> {
        let id = id.into();
        self.update(|map| {
            if map.contains_key(&id) {
                return Err(NailError::DuplicateProvider(id.to_string()));
            }
            info!("Registered provider '{}'", id);
            map.insert(id, adapter);
            Ok(())
        })
    }

    /// Register or overwrite an adapter, returning the previous one
    pub fn replace(&self, id: impl Into<ProviderId>, adapter: Arc<dyn Adapter>) -> Option<Arc<dyn Adapter>> {
        let id = id.into();
        self.update(|map| {
            info!("Replaced provider '{}'", id);
            map.insert(id, adapter)
        })
    }

    /// Remove an adapter, returning it if it was registered
    pub fn deregister(&self, id: &str) -> Option<Arc<dyn Adapter>> {
        if !self.contains(id) {
            return None;
        }
        self.update(|map| map.remove(id))
    }

    /// Look up an adapter; never falls back to a default
    pub fn resolve(&self, id: &str) -> NailResult<Arc<dyn Adapter>> {
        self.adapters
            .load()
            .get(id)
            .cloned()
            .ok_or_else(|| NailError::UnknownProvider(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.adapters.load().contains_key(id)
    }

    /// Registered identifiers, sorted
    pub fn ids(&self) -> Vec<ProviderId> {
        let mut ids: Vec<ProviderId> = self.adapters.load().keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.adapters.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.ids())
            .finish()
    }
}

static GLOBAL: ArcSwapOption<ProviderRegistry> = ArcSwapOption::const_empty();

/// Install `registry` as the process-wide registry.
///
/// If one is already installed it is left in place and returned as the
/// error; call [`shutdown`] first to swap it.
pub fn init(registry: ProviderRegistry) -> Result<Arc<ProviderRegistry>, Arc<ProviderRegistry>> {
    let registry = Arc::new(registry);
    let previous = GLOBAL.compare_and_swap(&None::<Arc<ProviderRegistry>>, Some(Arc::clone(&registry)));
    match arc_swap::Guard::into_inner(previous) {
        Some(existing) => Err(existing),
        None => {
            info!("Global provider registry initialized");
            Ok(registry)
        }
    }
}

/// The process-wide registry, if [`init`] has been called
pub fn global() -> Option<Arc<ProviderRegistry>> {
    GLOBAL.load_full()
}

/// Remove the process-wide registry, returning it.
///
/// Holders of the returned (or previously obtained) handle keep working.
pub fn shutdown() -> Option<Arc<ProviderRegistry>> {
    GLOBAL.swap(None)
}
