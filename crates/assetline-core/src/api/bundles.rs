//! Bundle lifecycle methods on AssetPipeline.

use std::sync::Arc;

use crate::bundle::Bundle;
use crate::error::Result;
use crate::AssetPipeline;

impl AssetPipeline {
    /// Make a bundle resident ahead of its first load.
    pub async fn load_bundle(&self, name: &str) -> Result<Arc<dyn Bundle>> {
        self.bundles.load_bundle(name).await
    }

    /// Unload a bundle and invalidate every cached item of it.
    pub fn unload_bundle(&self, name: &str) -> usize {
        self.bundles.unload_bundle(name)
    }

    pub fn is_bundle_loaded(&self, name: &str) -> bool {
        self.bundles.is_loaded(name)
    }

    /// Names of the bundles currently loaded.
    pub fn loaded_bundles(&self) -> Vec<String> {
        self.bundles.loaded_bundles()
    }
}
