//! Directory-backed bundles.
//!
//! Every sub-directory of the root is a bundle; its files are items, addressed
//! by relative path with or without extension. Composite kinds are read from
//! sibling files the same way the remote loader fetches companion URLs.

use async_trait::async_trait;
use futures::future::try_join_all;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

use super::{Bundle, BundleRegistry};
use crate::config::RoleMarker;
use crate::error::{AssetError, Result};
use crate::resource::{Payload, RecipeRegistry, ResourceFactory, ResourceHandle, ResourceKind};

/// Registry over a root directory of bundle directories.
pub struct FsBundleRegistry {
    root: PathBuf,
    factory: Arc<dyn ResourceFactory>,
    recipes: Arc<RecipeRegistry>,
    loaded: RwLock<HashMap<String, Arc<FsBundle>>>,
}

impl FsBundleRegistry {
    /// A registry over the bundle directories below `root`, using the built-in recipes.
    pub fn new(root: impl Into<PathBuf>, factory: Arc<dyn ResourceFactory>) -> Self {
        Self::with_recipes(root, factory, Arc::new(RecipeRegistry::new()))
    }

    /// Like [`FsBundleRegistry::new`] but assembling composites with `recipes`.
    pub fn with_recipes(
        root: impl Into<PathBuf>,
        factory: Arc<dyn ResourceFactory>,
        recipes: Arc<RecipeRegistry>,
    ) -> Self {
        Self {
            root: root.into(),
            factory,
            recipes,
            loaded: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bundle_dir(&self, name: &str) -> Option<PathBuf> {
        let valid = !name.is_empty()
            && Path::new(name)
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
            && !name.contains(['/', '\\']);
        valid.then(|| self.root.join(name))
    }
}

#[async_trait]
impl BundleRegistry for FsBundleRegistry {
    async fn has(&self, name: &str) -> bool {
        match self.bundle_dir(name) {
            Some(dir) => is_dir(&dir).await,
            None => false,
        }
    }

    fn resolve(&self, name: &str) -> Option<Arc<dyn Bundle>> {
        let loaded = self.loaded.read().expect("bundle registry lock poisoned");
        loaded.get(name).map(|b| b.clone() as Arc<dyn Bundle>)
    }

    async fn load(&self, name: &str) -> Result<Arc<dyn Bundle>> {
        if let Some(bundle) = self.resolve(name) {
            return Ok(bundle);
        }

        let dir = match self.bundle_dir(name) {
            Some(dir) if is_dir(&dir).await => dir,
            _ => {
                return Err(AssetError::BundleNotFound {
                    bundle: name.to_string(),
                })
            }
        };

        let mut loaded = self.loaded.write().expect("bundle registry lock poisoned");
        let bundle = loaded.entry(name.to_string()).or_insert_with(|| {
            info!("Loaded bundle '{}' from {}", name, dir.display());
            Arc::new(FsBundle {
                name: name.to_string(),
                dir,
                factory: self.factory.clone(),
                recipes: self.recipes.clone(),
            })
        });
        Ok(bundle.clone() as Arc<dyn Bundle>)
    }

    fn unload(&self, name: &str) -> bool {
        let mut loaded = self.loaded.write().expect("bundle registry lock poisoned");
        loaded.remove(name).is_some()
    }

    fn loaded(&self) -> Vec<String> {
        let loaded = self.loaded.read().expect("bundle registry lock poisoned");
        loaded.keys().cloned().collect()
    }
}

/// One bundle directory.
pub struct FsBundle {
    name: String,
    dir: PathBuf,
    factory: Arc<dyn ResourceFactory>,
    recipes: Arc<RecipeRegistry>,
}

impl FsBundle {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Strip a role marker and reject paths escaping the bundle.
    fn item_name(path: &str) -> Option<&str> {
        let name = [RoleMarker::SPRITE_FRAME, RoleMarker::TEXTURE]
            .iter()
            .find_map(|marker| {
                path.strip_suffix(marker)
                    .and_then(|rest| rest.strip_suffix('/'))
            })
            .unwrap_or(path);

        let relative = !name.is_empty()
            && Path::new(name)
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        relative.then_some(name)
    }

    async fn locate(&self, name: &str, extensions: &[&str]) -> Option<PathBuf> {
        let exact = self.dir.join(name);
        if exact.extension().is_some() && is_file(&exact).await {
            return Some(exact);
        }
        for ext in extensions {
            let candidate = self.dir.join(format!("{name}.{ext}"));
            if is_file(&candidate).await {
                return Some(candidate);
            }
        }
        None
    }
}

#[async_trait]
impl Bundle for FsBundle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn item_exists(&self, path: &str) -> bool {
        let Some(name) = Self::item_name(path) else {
            return false;
        };
        let extensions: Vec<&str> = ResourceKind::ALL
            .iter()
            .flat_map(|kind| kind.extensions().iter().copied())
            .collect();
        self.locate(name, &extensions).await.is_some()
    }

    async fn fetch(&self, path: &str, kind: ResourceKind) -> Result<ResourceHandle> {
        let not_found = || AssetError::NotFound {
            locator: format!("{}@{}", self.name, path),
        };
        let name = Self::item_name(path).ok_or_else(not_found)?;
        let file = self
            .locate(name, kind.extensions())
            .await
            .ok_or_else(not_found)?;

        let recipe = self.recipes.get(kind)?;
        let base = file.to_string_lossy().into_owned();
        let sources = recipe.sources(&base);
        debug!("Reading {} file(s) for {}@{}", sources.len(), self.name, path);

        let payloads = try_join_all(sources.iter().map(|source| async move {
            tokio::fs::read(source)
                .await
                .map(|bytes| Payload::new(source.clone(), bytes))
                .map_err(|e| AssetError::io_with_path(e, source))
        }))
        .await?;

        recipe.build(self.factory.as_ref(), kind, &base, payloads)
    }
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}
