//! Bundle-addressed loader.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::OriginLoader;
use crate::bundle::{ensure_loaded, BundleRegistry};
use crate::config::RoleMarker;
use crate::error::{AssetError, Result};
use crate::locator::{Origin, ParsedLocator};
use crate::resource::{ResourceHandle, ResourceKind};

/// Resolves `bundle@name` locators through a [`BundleRegistry`].
///
/// Loads the bundle on demand, then hands the item to the bundle's own
/// loader. Image requests get a role marker appended to the item path so the
/// bundle knows whether to build a sprite frame or a bare texture.
pub struct LocalLoader {
    registry: Arc<dyn BundleRegistry>,
}

impl LocalLoader {
    pub fn new(registry: Arc<dyn BundleRegistry>) -> Self {
        Self { registry }
    }

    /// Item path requested from the bundle for `kind`.
    pub fn item_path(kind: ResourceKind, name: &str) -> String {
        match kind {
            ResourceKind::SpriteFrame => format!("{}/{}", name, RoleMarker::SPRITE_FRAME),
            ResourceKind::Texture => format!("{}/{}", name, RoleMarker::TEXTURE),
            _ => name.to_string(),
        }
    }
}

#[async_trait]
impl OriginLoader for LocalLoader {
    async fn fetch(&self, kind: ResourceKind, locator: &ParsedLocator) -> Result<ResourceHandle> {
        let bundle_name = match (&locator.origin, &locator.bundle) {
            (Origin::Local, Some(bundle)) => bundle,
            _ => {
                return Err(AssetError::UnresolvableLocator {
                    locator: locator.raw.clone(),
                })
            }
        };

        let bundle = ensure_loaded(self.registry.as_ref(), bundle_name).await?;
        let path = Self::item_path(kind, &locator.name);
        if !bundle.item_exists(&path).await {
            return Err(AssetError::NotFound {
                locator: locator.raw.clone(),
            });
        }

        debug!("Fetching {} from bundle '{}' as {}", path, bundle_name, kind);
        bundle.fetch(&path, kind).await
    }

    fn is_resident(&self, locator: &ParsedLocator) -> bool {
        locator
            .bundle
            .as_deref()
            .is_some_and(|bundle| self.registry.resolve(bundle).is_some())
    }
}
