//! Bundle collaborators and lifecycle management.
//!
//! A bundle is a named group of local items. The pipeline does not know any
//! manifest format: it only asks a [`BundleRegistry`] whether a bundle exists,
//! gets it resident, and asks the [`Bundle`] to build items.

mod fs;

pub use fs::{FsBundle, FsBundleRegistry};

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::CacheStore;
use crate::error::Result;
use crate::locator::CacheKey;
use crate::resource::{ResourceHandle, ResourceKind};

/// A resident bundle.
#[async_trait]
pub trait Bundle: Send + Sync {
    fn name(&self) -> &str;

    /// Whether `path` names an item of this bundle. `path` may carry a role
    /// marker suffix.
    async fn item_exists(&self, path: &str) -> bool;

    /// Build the item at `path` as `kind`.
    async fn fetch(&self, path: &str, kind: ResourceKind) -> Result<ResourceHandle>;
}

/// Knows which bundles exist and which are resident.
#[async_trait]
pub trait BundleRegistry: Send + Sync {
    /// Whether a bundle called `name` can be loaded.
    async fn has(&self, name: &str) -> bool;

    /// The bundle, if it is resident.
    fn resolve(&self, name: &str) -> Option<Arc<dyn Bundle>>;

    /// Make a bundle resident. Loading a resident bundle returns it as is.
    async fn load(&self, name: &str) -> Result<Arc<dyn Bundle>>;

    /// Drop a resident bundle. Returns `false` if it was not resident.
    fn unload(&self, name: &str) -> bool;

    /// Names of resident bundles.
    fn loaded(&self) -> Vec<String>;
}

/// Resolve a resident bundle or load it.
pub async fn ensure_loaded(registry: &dyn BundleRegistry, name: &str) -> Result<Arc<dyn Bundle>> {
    match registry.resolve(name) {
        Some(bundle) => Ok(bundle),
        None => registry.load(name).await,
    }
}

/// Loads and unloads bundles, keeping the cache consistent with them.
pub struct BundleManager {
    registry: Arc<dyn BundleRegistry>,
    cache: Arc<CacheStore>,
}

impl BundleManager {
    /// Manage the bundles of `registry`, invalidating entries of `cache` on unload.
    pub fn new(registry: Arc<dyn BundleRegistry>, cache: Arc<CacheStore>) -> Self {
        Self { registry, cache }
    }

    pub fn registry(&self) -> &Arc<dyn BundleRegistry> {
        &self.registry
    }

    /// Resolve `name` through the registry and mark it loaded.
    pub async fn load_bundle(&self, name: &str) -> Result<Arc<dyn Bundle>> {
        let bundle = ensure_loaded(self.registry.as_ref(), name).await?;
        info!("Bundle '{}' is resident", name);
        Ok(bundle)
    }

    /// Unload `name` and invalidate every cache entry under `l:<name>@`.
    ///
    /// Entries are invalidated even if somebody still holds them: their
    /// resources cannot outlive the bundle. Returns the number of invalidated
    /// entries.
    pub fn unload_bundle(&self, name: &str) -> usize {
        if !self.registry.unload(name) {
            warn!("Unloading bundle '{}' which is not resident", name);
        }
        let invalidated = self.cache.invalidate_prefix(&CacheKey::bundle_prefix(name));
        info!(
            "Unloaded bundle '{}', invalidated {} cache entries",
            name, invalidated
        );
        invalidated
    }

    /// Whether `name` is currently resident.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.registry.resolve(name).is_some()
    }

    /// Names of the loaded bundles, sorted.
    pub fn loaded_bundles(&self) -> Vec<String> {
        let mut names = self.registry.loaded();
        names.sort();
        names
    }
}
