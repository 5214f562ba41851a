//! URL-addressed loader.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use super::OriginLoader;
use crate::error::{AssetError, Result};
use crate::locator::{Origin, ParsedLocator};
use crate::network::Transport;
use crate::resource::{
    DependencyIndex, Payload, RecipeRegistry, ResourceFactory, ResourceHandle, ResourceKind,
};

/// Downloads and assembles resources from URLs.
///
/// Simple kinds are one download and one resource. Composite kinds download
/// every companion payload in one batched fetch and assemble them into one
/// top-level resource; only that resource is returned (and later cached).
/// Nothing is recorded in the dependency index unless the whole assembly
/// succeeded.
pub struct RemoteLoader {
    transport: Arc<dyn Transport>,
    factory: Arc<dyn ResourceFactory>,
    recipes: Arc<RecipeRegistry>,
    dependencies: Arc<DependencyIndex>,
}

impl RemoteLoader {
    /// Create a loader that fetches through `transport` and records URLs in `dependencies`.
    pub fn new(
        transport: Arc<dyn Transport>,
        factory: Arc<dyn ResourceFactory>,
        recipes: Arc<RecipeRegistry>,
        dependencies: Arc<DependencyIndex>,
    ) -> Self {
        Self {
            transport,
            factory,
            recipes,
            dependencies,
        }
    }
}

#[async_trait]
impl OriginLoader for RemoteLoader {
    async fn fetch(&self, kind: ResourceKind, locator: &ParsedLocator) -> Result<ResourceHandle> {
        if locator.origin != Origin::Remote {
            return Err(AssetError::UnresolvableLocator {
                locator: locator.raw.clone(),
            });
        }

        let url = &locator.name;
        let recipe = self.recipes.get(kind)?;
        let urls = recipe.sources(url);
        debug!("Fetching {} payload(s) for {} as {}", urls.len(), url, kind);

        let bodies = self.transport.fetch_all(&urls).await?;
        if bodies.len() != urls.len() {
            return Err(AssetError::transport(
                url.as_str(),
                format!("expected {} payloads, got {}", urls.len(), bodies.len()),
            ));
        }

        let payloads = urls
            .iter()
            .zip(bodies)
            .map(|(source, bytes)| Payload::new(source.as_str(), bytes))
            .collect();
        let handle = recipe.build(self.factory.as_ref(), kind, url, payloads)?;

        self.dependencies
            .register(locator.key.as_str(), kind, urls);
        Ok(handle)
    }
}
