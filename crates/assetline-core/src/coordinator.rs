//! Cache-first load coordination.
//!
//! [`LoadCoordinator::load`] is the single entry point every higher layer goes
//! through: parse the locator, serve from the cache if possible, otherwise
//! dispatch to the loader of the locator's origin and cache the result.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::cache::CacheStore;
use crate::config::PipelineConfig;
use crate::error::{AssetError, Result};
use crate::loader::OriginLoader;
use crate::locator::{parse, Origin, ParsedLocator};
use crate::resource::{downcast, DependencyIndex, Resource, ResourceHandle, ResourceKind};

/// Options of a single load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    pub locator: String,
    /// Cache TTL; `None` applies the configured default, zero caches
    /// permanently.
    pub ttl: Option<Duration>,
}

impl LoadOptions {
    /// Options for `locator` with the configured default TTL.
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Cache without expiry; only release or invalidation removes the entry.
    pub fn permanent(self) -> Self {
        self.with_ttl(Duration::ZERO)
    }
}

impl From<&str> for LoadOptions {
    fn from(locator: &str) -> Self {
        Self::new(locator)
    }
}

impl From<String> for LoadOptions {
    fn from(locator: String) -> Self {
        Self::new(locator)
    }
}

/// Composes locator parsing, the cache and both origin loaders.
///
/// A cache hit takes no extra reference: callers that need a resource to
/// outlive its TTL extend it with [`retain`](Self::retain).
pub struct LoadCoordinator {
    cache: Arc<CacheStore>,
    local: Arc<dyn OriginLoader>,
    remote: Arc<dyn OriginLoader>,
    dependencies: Arc<DependencyIndex>,
    default_bundle: String,
    default_ttl: Duration,
}

impl LoadCoordinator {
    /// Wire the coordinator to its cache and loaders.
    ///
    /// `cache` should be attached to `dependencies` so that evicted remote
    /// entries drop their records.
    pub fn new(
        cache: Arc<CacheStore>,
        local: Arc<dyn OriginLoader>,
        remote: Arc<dyn OriginLoader>,
        dependencies: Arc<DependencyIndex>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            cache,
            local,
            remote,
            dependencies,
            default_bundle: config.default_bundle.clone(),
            default_ttl: config.default_ttl(),
        }
    }

    /// The cache every load goes through.
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Dependency records of remotely assembled resources.
    pub fn dependencies(&self) -> &Arc<DependencyIndex> {
        &self.dependencies
    }

    /// Bundle used by `l:name` locators.
    pub fn default_bundle(&self) -> &str {
        &self.default_bundle
    }

    /// TTL applied when [`LoadOptions::ttl`] is unset.
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Parse `locator` against the configured default bundle.
    pub fn parse(&self, locator: &str) -> ParsedLocator {
        parse(locator, &self.default_bundle)
    }

    /// Load a resource, surfacing why it failed.
    pub async fn try_load(
        &self,
        kind: ResourceKind,
        options: impl Into<LoadOptions>,
    ) -> Result<ResourceHandle> {
        let options = options.into();
        let parsed = self.parse(&options.locator);
        let loader = match parsed.origin {
            Origin::Local => &self.local,
            Origin::Remote => &self.remote,
            Origin::Unknown => {
                return Err(AssetError::UnresolvableLocator {
                    locator: options.locator,
                })
            }
        };

        if let Some(hit) = self.cache.get(&parsed.key) {
            debug!("Cache hit for {}", parsed.key);
            return Ok(hit);
        }

        let resource = loader.fetch(kind, &parsed).await?;
        if !resource.is_valid() {
            return Err(AssetError::InvalidResource {
                key: parsed.key.to_string(),
            });
        }

        // Another load of the same key may have finished while we were
        // suspended; insert hands back whichever resource the cache kept.
        let ttl = options.ttl.unwrap_or(self.default_ttl);
        let Some(stored) = self
            .cache
            .insert(parsed.key.clone(), resource, parsed.origin, ttl)
        else {
            self.dependencies.remove(parsed.key.as_str());
            return Err(AssetError::InvalidResource {
                key: parsed.key.to_string(),
            });
        };

        // The source may have been unloaded while the fetch was suspended.
        // Checking after the insert means an unload racing with us either sees
        // the entry and invalidates it, or is seen here.
        if !loader.is_resident(&parsed) {
            warn!("{} was unloaded during the fetch, dropping {}", parsed.raw, parsed.key);
            self.cache.invalidate(&parsed.key);
            return Err(match parsed.bundle {
                Some(bundle) => AssetError::BundleNotFound { bundle },
                None => AssetError::NotFound {
                    locator: parsed.raw,
                },
            });
        }

        Ok(stored)
    }

    /// Load a resource; failures are logged and yield `None`.
    pub async fn load(
        &self,
        kind: ResourceKind,
        options: impl Into<LoadOptions>,
    ) -> Option<ResourceHandle> {
        let options = options.into();
        let locator = options.locator.clone();
        match self.try_load(kind, options).await {
            Ok(resource) => Some(resource),
            Err(e) => {
                warn!("Failed to load {} as {}: {}", locator, kind, e);
                None
            }
        }
    }

    /// Load and downcast to the engine's concrete type.
    pub async fn load_as<T: Resource>(
        &self,
        kind: ResourceKind,
        options: impl Into<LoadOptions>,
    ) -> Option<Arc<T>> {
        let resource = self.load(kind, options).await?;
        let downcast = downcast::<T>(resource);
        if downcast.is_none() {
            warn!("Loaded {} resource is not of the requested type", kind);
        }
        downcast
    }

    /// Load a bare texture (no sprite frame).
    pub async fn load_texture(&self, options: impl Into<LoadOptions>) -> Option<ResourceHandle> {
        self.load(ResourceKind::Texture, options).await
    }

    /// Load an image as a sprite frame.
    pub async fn load_sprite_frame(
        &self,
        options: impl Into<LoadOptions>,
    ) -> Option<ResourceHandle> {
        self.load(ResourceKind::SpriteFrame, options).await
    }

    pub async fn load_text(&self, options: impl Into<LoadOptions>) -> Option<ResourceHandle> {
        self.load(ResourceKind::Text, options).await
    }

    pub async fn load_json(&self, options: impl Into<LoadOptions>) -> Option<ResourceHandle> {
        self.load(ResourceKind::Json, options).await
    }

    pub async fn load_binary(&self, options: impl Into<LoadOptions>) -> Option<ResourceHandle> {
        self.load(ResourceKind::Binary, options).await
    }

    pub async fn load_audio(&self, options: impl Into<LoadOptions>) -> Option<ResourceHandle> {
        self.load(ResourceKind::Audio, options).await
    }

    /// Load an atlas description together with its page texture.
    pub async fn load_sprite_atlas(
        &self,
        options: impl Into<LoadOptions>,
    ) -> Option<ResourceHandle> {
        self.load(ResourceKind::SpriteAtlas, options).await
    }

    /// Load a bitmap font description together with its glyph page.
    pub async fn load_bitmap_font(
        &self,
        options: impl Into<LoadOptions>,
    ) -> Option<ResourceHandle> {
        self.load(ResourceKind::BitmapFont, options).await
    }

    /// Load a skeleton with its atlas and page texture as one resource.
    pub async fn load_skeleton(&self, options: impl Into<LoadOptions>) -> Option<ResourceHandle> {
        self.load(ResourceKind::Skeleton, options).await
    }

    /// Add a logical holder to the cached resource of `locator`.
    ///
    /// Returns the new count, 0 if the locator is not cached.
    pub fn retain(&self, locator: &str) -> u32 {
        let parsed = self.parse(locator);
        if !parsed.is_resolvable() {
            return 0;
        }
        self.cache.add_ref(&parsed.key)
    }

    /// Drop a logical holder; the entry goes away once nobody holds it.
    ///
    /// Returns `false` if the locator was not cached.
    pub fn release(&self, locator: &str) -> bool {
        let parsed = self.parse(locator);
        if !parsed.is_resolvable() || self.cache.ref_count(&parsed.key).is_none() {
            return false;
        }

        let remaining = self.cache.dec_ref(&parsed.key, true);
        debug!("Released {} ({} holder(s) left)", parsed.key, remaining);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::RawResource;
    use crate::testing::fixture;

    #[tokio::test]
    async fn test_cache_hit_avoids_refetch() {
        let fx = fixture();

        let first = fx.coordinator.load_texture("l:hero").await.unwrap();
        let second = fx.coordinator.load_texture("l:resources@hero").await.unwrap();

        assert_eq!(fx.local.calls(), vec!["hero".to_string()]);
        assert!(Arc::ptr_eq(
            &downcast::<RawResource>(first).unwrap(),
            &downcast::<RawResource>(second).unwrap()
        ));
    }

    #[tokio::test]
    async fn test_unknown_locator_is_terminal() {
        let fx = fixture();

        let err = fx
            .coordinator
            .try_load(ResourceKind::Texture, "x:foo")
            .await
            .err()
            .unwrap();
        assert!(err.is_terminal());
        assert!(fx.coordinator.load_text("x:foo").await.is_none());
        assert!(fx.local.calls().is_empty());
        assert!(fx.remote.calls().is_empty());
        assert!(fx.cache.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_by_origin() {
        let fx = fixture();
        fx.coordinator.load_json("l:ui@config").await.unwrap();
        fx.coordinator.load_json("r:https://cdn/config.json").await.unwrap();

        assert_eq!(fx.local.calls(), vec!["config".to_string()]);
        assert_eq!(fx.remote.calls(), vec!["https://cdn/config.json".to_string()]);
        assert_eq!(fx.cache.keys(Some(Origin::Remote)).len(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached_or_retried() {
        let fx = fixture();
        fx.local.fail("missing");

        assert!(fx.coordinator.load_texture("l:missing").await.is_none());
        assert!(fx.cache.is_empty());
        assert_eq!(fx.local.calls().len(), 1);

        assert!(fx.coordinator.load_texture("l:missing").await.is_none());
        assert_eq!(fx.local.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_invalid_resource_is_never_cached() {
        let fx = fixture();
        fx.remote.produce_invalid("https://cdn/broken.png");

        let err = fx
            .coordinator
            .try_load(ResourceKind::Texture, "r:https://cdn/broken.png")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, AssetError::InvalidResource { .. }));
        assert!(fx.cache.is_empty());
    }

    #[tokio::test]
    async fn test_ttl_option() {
        let fx = fixture();
        fx.coordinator
            .load_text(LoadOptions::new("l:intro").permanent())
            .await
            .unwrap();
        fx.coordinator.load_text("l:outro").await.unwrap();

        let stats = fx.cache.stats();
        assert_eq!(stats.permanent_entries, 1);
        assert_eq!(stats.expiring_entries, 1);
    }

    #[tokio::test]
    async fn test_load_as_downcasts() {
        let fx = fixture();
        let raw = fx
            .coordinator
            .load_as::<RawResource>(ResourceKind::Text, "l:intro")
            .await
            .unwrap();
        assert_eq!(raw.source(), "intro");
    }

    #[tokio::test]
    async fn test_retain_and_release() {
        let fx = fixture();
        let locator = "r:https://cdn/a.png";
        fx.coordinator.load_texture(locator).await.unwrap();
        fx.dependencies
            .register("r:https://cdn/a.png", ResourceKind::Texture, vec!["https://cdn/a.png".into()]);

        assert_eq!(fx.coordinator.retain(locator), 1);
        assert_eq!(fx.coordinator.retain(locator), 2);

        assert!(fx.coordinator.release(locator));
        assert_eq!(fx.cache.len(), 1);
        assert!(fx.dependencies.contains("r:https://cdn/a.png"));

        assert!(fx.coordinator.release(locator));
        assert!(fx.cache.is_empty());
        assert!(fx.dependencies.is_empty());

        assert!(!fx.coordinator.release(locator));
        assert_eq!(fx.coordinator.retain("x:foo"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unload_during_fetch_drops_result() {
        let fx = fixture();
        fx.local.delay("button", 100);

        let coordinator = fx.coordinator.clone();
        let pending = tokio::spawn(async move {
            coordinator.try_load(ResourceKind::Texture, "l:ui@button").await
        });

        tokio::time::sleep(Duration::from_millis(10)).await;
        fx.local.unload("ui");
        assert_eq!(fx.cache.invalidate_prefix("l:ui@"), 0);

        let err = pending.await.unwrap().err().unwrap();
        assert!(matches!(err, AssetError::BundleNotFound { ref bundle } if bundle == "ui"));
        assert!(fx.cache.is_empty());

        // Other bundles are unaffected.
        assert!(fx.coordinator.load_texture("l:hud@button").await.is_some());
    }
}
