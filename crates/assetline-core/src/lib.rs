//! Assetline Core - Headless asset acquisition and caching pipeline.
//!
//! Given a resource locator and a kind, return a cached or freshly fetched
//! resource handle, with explicit lifetime control and cancellable bulk
//! loading:
//!
//! - `l:[bundle@]name` locators are served from bundles ([`bundle`]),
//! - `r:url` locators are downloaded and assembled ([`network`], [`loader`]),
//! - results live in a reference-counted cache with TTL expiry ([`cache`]),
//! - bulk loads run sequentially, in batches, or with bounded parallelism
//!   ([`task`]).
//!
//! The engine side (what a resource actually *is*) is injected through
//! [`resource::ResourceFactory`]; [`resource::RawResourceFactory`] keeps
//! payloads as opaque bytes.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use assetline_core::{AssetPipeline, ResourceKind};
//! use assetline_core::resource::RawResourceFactory;
//!
//! #[tokio::main]
//! async fn main() -> assetline_core::Result<()> {
//!     let pipeline = AssetPipeline::builder(Arc::new(RawResourceFactory::new()))
//!         .with_bundle_root("./assets")
//!         .build()?;
//!
//!     let hero = pipeline.load(ResourceKind::SpriteFrame, "l:hero").await;
//!     println!("hero loaded: {}", hero.is_some());
//!
//!     pipeline.retain("l:hero");
//!     pipeline.release("l:hero");
//!     Ok(())
//! }
//! ```

pub mod abort;
pub mod bundle;
pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod loader;
pub mod locator;
pub mod network;
pub mod resource;
pub mod task;

mod api;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use abort::AbortSignal;
pub use bundle::{Bundle, BundleManager, BundleRegistry, FsBundleRegistry};
pub use cache::{CacheEntryInfo, CacheStats, CacheStore};
pub use config::PipelineConfig;
pub use coordinator::{LoadCoordinator, LoadOptions};
pub use error::{AssetError, Result};
pub use locator::{parse, CacheKey, Locator, Origin, ParsedLocator};
pub use network::{HttpTransport, Transport};
pub use resource::{Resource, ResourceFactory, ResourceHandle, ResourceKind};
pub use task::{
    LoadFailure, LoadHandle, LoadItem, LoadOrchestrator, LoadProgress, LoadResults, LoadTask,
    TaskOutcome,
};

pub use api::AssetPipelineBuilder;

use std::sync::Arc;

use resource::DependencyIndex;

/// Main entry point of the pipeline.
///
/// Owns the cache, the coordinator, the orchestrator and the bundle manager,
/// all wired to the collaborators given to [`AssetPipelineBuilder`]. Cheap
/// handles to each part are available for callers that need them directly.
pub struct AssetPipeline {
    config: PipelineConfig,
    cache: Arc<CacheStore>,
    dependencies: Arc<DependencyIndex>,
    coordinator: Arc<LoadCoordinator>,
    orchestrator: LoadOrchestrator,
    bundles: BundleManager,
}

impl AssetPipeline {
    /// Create a builder around the engine's resource factory.
    pub fn builder(factory: Arc<dyn ResourceFactory>) -> AssetPipelineBuilder {
        AssetPipelineBuilder::new(factory)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The shared cache. Every cache operation is available here.
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Dependency records of remotely assembled resources.
    pub fn dependencies(&self) -> &Arc<DependencyIndex> {
        &self.dependencies
    }

    pub fn coordinator(&self) -> &Arc<LoadCoordinator> {
        &self.coordinator
    }

    pub fn orchestrator(&self) -> &LoadOrchestrator {
        &self.orchestrator
    }

    pub fn bundles(&self) -> &BundleManager {
        &self.bundles
    }
}
