//! Scripted collaborators shared by unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::cache::CacheStore;
use crate::config::PipelineConfig;
use crate::coordinator::LoadCoordinator;
use crate::error::{AssetError, Result};
use crate::loader::OriginLoader;
use crate::locator::ParsedLocator;
use crate::resource::{DependencyIndex, RawResource, ResourceHandle, ResourceKind};

/// Loader whose latency and failures are scripted per item name.
pub(crate) struct ScriptedLoader {
    delays: Mutex<HashMap<String, Duration>>,
    failures: Mutex<HashSet<String>>,
    invalid: Mutex<HashSet<String>>,
    unloaded: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedLoader {
    pub(crate) fn new() -> Self {
        Self {
            delays: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashSet::new()),
            invalid: Mutex::new(HashSet::new()),
            unloaded: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn delay(&self, name: &str, ms: u64) {
        self.delays
            .lock()
            .unwrap()
            .insert(name.to_string(), Duration::from_millis(ms));
    }

    pub(crate) fn fail(&self, name: &str) {
        self.failures.lock().unwrap().insert(name.to_string());
    }

    pub(crate) fn produce_invalid(&self, name: &str) {
        self.invalid.lock().unwrap().insert(name.to_string());
    }

    /// Report every item of `bundle` as no longer resident.
    pub(crate) fn unload(&self, bundle: &str) {
        self.unloaded.lock().unwrap().insert(bundle.to_string());
    }

    /// Item names fetched so far, in call order.
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OriginLoader for ScriptedLoader {
    async fn fetch(&self, kind: ResourceKind, locator: &ParsedLocator) -> Result<ResourceHandle> {
        let name = locator.name.clone();
        self.calls.lock().unwrap().push(name.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let delay = self.delays.lock().unwrap().get(&name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failures.lock().unwrap().contains(&name) {
            return Err(AssetError::NotFound {
                locator: locator.raw.clone(),
            });
        }
        let resource = RawResource::new(kind, name.as_str(), Bytes::from_static(b"data"));
        if self.invalid.lock().unwrap().contains(&name) {
            resource.invalidate();
        }
        Ok(Arc::new(resource))
    }

    fn is_resident(&self, locator: &ParsedLocator) -> bool {
        match &locator.bundle {
            Some(bundle) => !self.unloaded.lock().unwrap().contains(bundle),
            None => true,
        }
    }
}

pub(crate) struct Fixture {
    pub(crate) coordinator: Arc<LoadCoordinator>,
    pub(crate) local: Arc<ScriptedLoader>,
    pub(crate) remote: Arc<ScriptedLoader>,
    pub(crate) cache: Arc<CacheStore>,
    pub(crate) dependencies: Arc<DependencyIndex>,
}

pub(crate) fn fixture() -> Fixture {
    let local = Arc::new(ScriptedLoader::new());
    let remote = Arc::new(ScriptedLoader::new());
    let dependencies = Arc::new(DependencyIndex::new());
    let cache = Arc::new(CacheStore::with_dependencies(dependencies.clone()));
    let coordinator = Arc::new(LoadCoordinator::new(
        cache.clone(),
        local.clone(),
        remote.clone(),
        dependencies.clone(),
        &PipelineConfig::default(),
    ));
    Fixture {
        coordinator,
        local,
        remote,
        cache,
        dependencies,
    }
}
