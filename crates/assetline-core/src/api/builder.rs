//! Builder for wiring an AssetPipeline.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use crate::bundle::{BundleManager, BundleRegistry, FsBundleRegistry};
use crate::cache::CacheStore;
use crate::config::PipelineConfig;
use crate::coordinator::LoadCoordinator;
use crate::error::{AssetError, Result};
use crate::loader::{LocalLoader, RemoteLoader};
use crate::network::{HttpTransport, Transport};
use crate::resource::{DependencyIndex, RecipeRegistry, ResourceFactory};
use crate::task::LoadOrchestrator;
use crate::AssetPipeline;

/// Builder for configuring an [`AssetPipeline`].
///
/// Every collaborator is injected here; nothing is looked up globally.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = AssetPipeline::builder(Arc::new(RawResourceFactory::new()))
///     .with_config(PipelineConfig::from_file(Path::new("pipeline.json"))?)
///     .with_transport(Arc::new(my_transport))
///     .build()?;
/// ```
pub struct AssetPipelineBuilder {
    factory: Arc<dyn ResourceFactory>,
    config: PipelineConfig,
    registry: Option<Arc<dyn BundleRegistry>>,
    transport: Option<Arc<dyn Transport>>,
    recipes: RecipeRegistry,
}

impl AssetPipelineBuilder {
    /// Start a builder with the default config and the given resource factory.
    pub fn new(factory: Arc<dyn ResourceFactory>) -> Self {
        Self {
            factory,
            config: PipelineConfig::default(),
            registry: None,
            transport: None,
            recipes: RecipeRegistry::new(),
        }
    }

    /// Use `config` instead of the defaults.
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Serve local locators from sub-directories of `root`.
    ///
    /// Ignored when a registry is given with
    /// [`with_bundle_registry`](Self::with_bundle_registry).
    pub fn with_bundle_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.bundle_root = Some(root.into());
        self
    }

    /// Replace the filesystem registry, e.g. with an embedded one.
    pub fn with_bundle_registry(mut self, registry: Arc<dyn BundleRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Default: [`HttpTransport`] configured from the pipeline config.
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the assembly recipes. Default: the built-in recipe of every
    /// kind.
    pub fn with_recipes(mut self, recipes: RecipeRegistry) -> Self {
        self.recipes = recipes;
        self
    }

    /// Build the pipeline.
    pub fn build(self) -> Result<AssetPipeline> {
        self.config.validate()?;
        let recipes = Arc::new(self.recipes);

        let registry: Arc<dyn BundleRegistry> = match (self.registry, &self.config.bundle_root) {
            (Some(registry), _) => registry,
            (None, Some(root)) => Arc::new(FsBundleRegistry::with_recipes(
                root.clone(),
                self.factory.clone(),
                recipes.clone(),
            )),
            (None, None) => {
                return Err(AssetError::Config {
                    message: "no bundle registry: set bundle_root or provide a registry"
                        .to_string(),
                })
            }
        };

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::from_config(&self.config)?),
        };

        let dependencies = Arc::new(DependencyIndex::new());
        let cache = Arc::new(CacheStore::with_dependencies(dependencies.clone()));
        let local = Arc::new(LocalLoader::new(registry.clone()));
        let remote = Arc::new(RemoteLoader::new(
            transport,
            self.factory,
            recipes,
            dependencies.clone(),
        ));
        let coordinator = Arc::new(LoadCoordinator::new(
            cache.clone(),
            local,
            remote,
            dependencies.clone(),
            &self.config,
        ));

        info!(
            "Asset pipeline ready (default bundle '{}', default TTL {:?})",
            self.config.default_bundle,
            self.config.default_ttl()
        );

        Ok(AssetPipeline {
            orchestrator: LoadOrchestrator::new(coordinator.clone()),
            bundles: BundleManager::new(registry, cache.clone()),
            config: self.config,
            cache,
            dependencies,
            coordinator,
        })
    }
}
