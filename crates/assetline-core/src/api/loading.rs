//! Loading methods on AssetPipeline.

use std::sync::Arc;

use crate::coordinator::LoadOptions;
use crate::error::Result;
use crate::resource::{Resource, ResourceHandle, ResourceKind};
use crate::task::{LoadHandle, LoadItem, LoadProgress, LoadResults};
use crate::AssetPipeline;

impl AssetPipeline {
    // ========================================
    // Single loads
    // ========================================

    /// Cache-first load. Failures are logged and yield `None`.
    pub async fn load(
        &self,
        kind: ResourceKind,
        options: impl Into<LoadOptions>,
    ) -> Option<ResourceHandle> {
        self.coordinator.load(kind, options).await
    }

    /// Cache-first load that reports why it failed.
    pub async fn try_load(
        &self,
        kind: ResourceKind,
        options: impl Into<LoadOptions>,
    ) -> Result<ResourceHandle> {
        self.coordinator.try_load(kind, options).await
    }

    /// Load and downcast to the engine's concrete resource type.
    pub async fn load_as<T: Resource>(
        &self,
        kind: ResourceKind,
        options: impl Into<LoadOptions>,
    ) -> Option<Arc<T>> {
        self.coordinator.load_as::<T>(kind, options).await
    }

    // ========================================
    // Lifetime control
    // ========================================

    /// Add a logical holder to a cached resource.
    pub fn retain(&self, locator: &str) -> u32 {
        self.coordinator.retain(locator)
    }

    /// Drop a logical holder; unheld resources are released right away.
    pub fn release(&self, locator: &str) -> bool {
        self.coordinator.release(locator)
    }

    // ========================================
    // Bulk loads
    // ========================================

    /// Sequential load with in-order progress. Not cancellable.
    pub async fn load_many(
        &self,
        items: Vec<LoadItem>,
        on_progress: impl FnMut(&LoadProgress),
    ) -> LoadResults {
        self.orchestrator.load_many(items, on_progress).await
    }

    /// Concurrent load of every item. Not cancellable.
    pub async fn load_batch(&self, items: Vec<LoadItem>) -> LoadResults {
        self.orchestrator.load_batch(items).await
    }

    /// Cancellable sequential load in the background.
    pub fn load_sequence(
        &self,
        items: Vec<LoadItem>,
        on_progress: impl FnMut(&LoadProgress) + Send + 'static,
        on_complete: impl FnOnce(LoadResults) + Send + 'static,
    ) -> LoadHandle {
        self.orchestrator
            .load_sequence(items, on_progress, on_complete)
    }

    /// Cancellable bounded-parallel load in the background.
    ///
    /// `concurrency` of `None` uses the configured `parallel_concurrency`.
    pub fn load_parallel(
        &self,
        items: Vec<LoadItem>,
        on_progress: impl FnMut(&LoadProgress) + Send + 'static,
        on_complete: impl FnOnce(LoadResults) + Send + 'static,
        concurrency: Option<usize>,
    ) -> LoadHandle {
        let concurrency = concurrency.unwrap_or(self.config.parallel_concurrency);
        self.orchestrator
            .load_parallel(items, on_progress, on_complete, concurrency)
    }
}
