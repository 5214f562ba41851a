//! Shared dependency index for resources built outside of bundles.
//!
//! Bundle items carry their own dependency metadata. Resources assembled by the
//! remote loader don't, so the loader records here which payloads each
//! top-level resource was built from. The engine side can consult it to account
//! for sub-resources; the coordinator drops a record once its cache entry is
//! gone.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use super::ResourceKind;

/// Dependencies of one top-level resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyRecord {
    /// Identity of the top-level resource (its cache key).
    pub id: String,
    pub kind: ResourceKind,
    /// Identities (URLs) of the payloads it was assembled from.
    pub dependencies: Vec<String>,
}

/// Thread-safe map from resource identity to its dependency record.
#[derive(Debug, Default)]
pub struct DependencyIndex {
    records: Mutex<HashMap<String, DependencyRecord>>,
}

impl DependencyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the record for `id`.
    pub fn register(&self, id: impl Into<String>, kind: ResourceKind, dependencies: Vec<String>) {
        let id = id.into();
        debug!("Registering {} dependencies for {}", dependencies.len(), id);
        let mut records = self.records.lock().expect("dependency index lock poisoned");
        records.insert(
            id.clone(),
            DependencyRecord {
                id,
                kind,
                dependencies,
            },
        );
    }

    /// Get the full record for `id`, if one exists.
    pub fn get(&self, id: &str) -> Option<DependencyRecord> {
        let records = self.records.lock().expect("dependency index lock poisoned");
        records.get(id).cloned()
    }

    /// URLs recorded for `id`, empty if there is no record.
    pub fn dependencies(&self, id: &str) -> Vec<String> {
        self.get(id).map(|r| r.dependencies).unwrap_or_default()
    }

    pub fn contains(&self, id: &str) -> bool {
        let records = self.records.lock().expect("dependency index lock poisoned");
        records.contains_key(id)
    }

    /// Drop the record of `id`. Returns `false` if there was none.
    pub fn remove(&self, id: &str) -> bool {
        let mut records = self.records.lock().expect("dependency index lock poisoned");
        records.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        let records = self.records.lock().expect("dependency index lock poisoned");
        records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_get() {
        let index = DependencyIndex::new();
        index.register(
            "r:https://cdn/ui.plist",
            ResourceKind::SpriteAtlas,
            vec!["https://cdn/ui.plist".into(), "https://cdn/ui.png".into()],
        );

        let record = index.get("r:https://cdn/ui.plist").unwrap();
        assert_eq!(record.kind, ResourceKind::SpriteAtlas);
        assert_eq!(record.dependencies.len(), 2);
        assert!(index.contains("r:https://cdn/ui.plist"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_register_replaces() {
        let index = DependencyIndex::new();
        index.register("r:a", ResourceKind::Texture, vec!["a".into()]);
        index.register("r:a", ResourceKind::Texture, vec!["b".into()]);
        assert_eq!(index.dependencies("r:a"), vec!["b".to_string()]);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_remove() {
        let index = DependencyIndex::new();
        index.register("r:a", ResourceKind::Text, vec!["a".into()]);
        assert!(index.remove("r:a"));
        assert!(!index.remove("r:a"));
        assert!(index.is_empty());
        assert!(index.dependencies("r:a").is_empty());
    }
}
