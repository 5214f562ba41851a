//! The cache store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::types::{CacheEntry, CacheEntryInfo, CacheStats};
use crate::locator::{CacheKey, Origin};
use crate::resource::{DependencyIndex, ResourceHandle};

fn same_resource(a: &ResourceHandle, b: &ResourceHandle) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

/// Keyed table of cached resources.
///
/// Every operation takes the internal lock once and never across an `.await`,
/// so single operations are atomic. Sequences of operations are not: callers
/// must not assume an entry they saw is still present after suspending.
/// Native references are released after the lock is dropped.
///
/// When attached to a [`DependencyIndex`], every remote entry that leaves the
/// store (purge, delete, clear, release) also drops its dependency record.
#[derive(Default)]
pub struct CacheStore {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    dependencies: Option<Arc<DependencyIndex>>,
}

impl CacheStore {
    /// Create a standalone store with no dependency index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store that keeps `dependencies` in step with its remote
    /// entries.
    pub fn with_dependencies(dependencies: Arc<DependencyIndex>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            dependencies: Some(dependencies),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, CacheEntry>> {
        self.entries.lock().expect("cache lock poisoned")
    }

    /// Give back the native reference of each removed entry and forget the
    /// dependency records of removed remote entries.
    fn evict(&self, removed: Vec<CacheEntry>) {
        for entry in removed {
            if let Some(dependencies) = &self.dependencies {
                if entry.key.origin() == Origin::Remote && dependencies.remove(entry.key.as_str()) {
                    debug!("Dropped dependency record of {}", entry.key);
                }
            }
            Self::release_native(entry);
        }
    }

    fn release_native(entry: CacheEntry) {
        debug!("Evicting {} (refs={})", entry.key, entry.ref_count);
        entry.resource.release();
    }

    /// Cache `resource` under `key`.
    ///
    /// Returns `false` (and caches nothing) when the resource is invalid.
    pub fn set(&self, key: CacheKey, resource: ResourceHandle, origin: Origin, ttl: Duration) -> bool {
        self.insert(key, resource, origin, ttl).is_some()
    }

    /// Like [`set`](Self::set), returning the handle actually stored.
    ///
    /// If a live entry already exists for `key` it wins: no second native
    /// reference is taken and the existing handle is returned.
    pub fn insert(
        &self,
        key: CacheKey,
        resource: ResourceHandle,
        origin: Origin,
        ttl: Duration,
    ) -> Option<ResourceHandle> {
        if !resource.is_valid() {
            warn!("Refusing to cache invalid resource for {}", key);
            return None;
        }

        let now = Instant::now();
        let mut replaced = Vec::new();
        let stored = {
            let mut entries = self.lock();
            let existing_live = match entries.get_mut(&key) {
                Some(existing) if !existing.is_stale(now) => {
                    if !same_resource(&existing.resource, &resource) {
                        debug!("{} already cached, keeping the existing resource", key);
                    }
                    existing.last_accessed = now;
                    Some(existing.resource.clone())
                }
                _ => None,
            };

            match existing_live {
                Some(handle) => handle,
                None => {
                    if let Some(stale) = entries.remove(&key) {
                        replaced.push(stale);
                    }
                    resource.retain();
                    debug!("Caching {} ({}, ttl={:?})", key, origin, ttl);
                    entries.insert(
                        key.clone(),
                        CacheEntry::new(key, resource.clone(), origin, ttl, now),
                    );
                    resource
                }
            }
        };

        // The replacement keeps the key, so its dependency record stays.
        replaced.into_iter().for_each(Self::release_native);
        Some(stored)
    }

    /// Return the cached resource, purging the entry if it is invalid or
    /// expired.
    pub fn get(&self, key: &CacheKey) -> Option<ResourceHandle> {
        let now = Instant::now();
        let purged = {
            let mut entries = self.lock();
            match entries.get_mut(key) {
                None => return None,
                Some(entry) if !entry.is_stale(now) => {
                    entry.last_accessed = now;
                    return Some(entry.resource.clone());
                }
                Some(_) => {}
            }
            entries.remove(key)
        };

        self.evict(purged.into_iter().collect());
        None
    }

    /// Same purge semantics as [`get`](Self::get), without returning the
    /// resource.
    pub fn has(&self, key: &CacheKey) -> bool {
        let now = Instant::now();
        let purged = {
            let mut entries = self.lock();
            match entries.get(key) {
                None => return false,
                Some(entry) if !entry.is_stale(now) => return true,
                Some(_) => entries.remove(key),
            }
        };

        self.evict(purged.into_iter().collect());
        false
    }

    /// Add a logical holder and restart the expiry clock.
    ///
    /// The clock restarts here, not on release: an entry acquired and released
    /// right away stays protected for a full TTL from the acquisition.
    /// Returns the new count, or 0 when the key is not cached.
    pub fn add_ref(&self, key: &CacheKey) -> u32 {
        let now = Instant::now();
        let purged = {
            let mut entries = self.lock();
            match entries.get_mut(key) {
                None => {
                    warn!("add_ref on uncached key {}", key);
                    return 0;
                }
                Some(entry) if entry.resource.is_valid() => {
                    entry.ref_count += 1;
                    entry.expires_at = CacheEntry::deadline(entry.ttl, now);
                    entry.last_accessed = now;
                    return entry.ref_count;
                }
                Some(_) => entries.remove(key),
            }
        };

        warn!("add_ref on invalidated resource {}, entry purged", key);
        self.evict(purged.into_iter().collect());
        0
    }

    /// Drop a logical holder (floor 0).
    ///
    /// With `auto_release`, an entry whose count is 0 afterwards is deleted
    /// immediately.
    pub fn dec_ref(&self, key: &CacheKey, auto_release: bool) -> u32 {
        let (count, removed) = {
            let mut entries = self.lock();
            let Some(entry) = entries.get_mut(key) else {
                debug!("dec_ref on uncached key {}", key);
                return 0;
            };
            entry.ref_count = entry.ref_count.saturating_sub(1);
            let count = entry.ref_count;
            let removed = if auto_release && count == 0 {
                entries.remove(key)
            } else {
                None
            };
            (count, removed)
        };

        self.evict(removed.into_iter().collect());
        count
    }

    /// Delete an entry that is unheld or invalid.
    pub fn delete(&self, key: &CacheKey) -> bool {
        let removed = {
            let mut entries = self.lock();
            match entries.get(key) {
                None => return false,
                Some(entry) if !entry.is_deletable() => {
                    debug!("Not deleting {}: {} holder(s)", key, entry.ref_count);
                    return false;
                }
                Some(_) => entries.remove(key),
            }
        };

        self.evict(removed.into_iter().collect());
        true
    }

    /// Purge every invalid or expired unheld entry.
    pub fn clear_unused(&self) -> usize {
        let now = Instant::now();
        self.remove_where(|entry| entry.is_stale(now))
    }

    /// Delete every deletable entry. Held entries survive.
    pub fn clear(&self) -> usize {
        self.remove_where(CacheEntry::is_deletable)
    }

    /// Delete every deletable entry of `origin`.
    pub fn clear_by_source(&self, origin: Origin) -> usize {
        self.remove_where(|entry| entry.origin == origin && entry.is_deletable())
    }

    /// Remove every entry whose key starts with `prefix`, held or not.
    ///
    /// Used when the owner of those resources goes away (bundle unload). Each
    /// removal still releases exactly one native reference.
    pub fn invalidate_prefix(&self, prefix: &str) -> usize {
        self.remove_where(|entry| {
            let matches = entry.key.as_str().starts_with(prefix);
            if matches && entry.ref_count > 0 {
                warn!(
                    "Invalidating {} while it still has {} holder(s)",
                    entry.key, entry.ref_count
                );
            }
            matches
        })
    }

    /// Remove the entry of `key`, held or not.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        let removed = self.lock().remove(key);
        let found = removed.is_some();
        self.evict(removed.into_iter().collect());
        found
    }

    fn remove_where(&self, mut predicate: impl FnMut(&CacheEntry) -> bool) -> usize {
        let removed: Vec<CacheEntry> = {
            let mut entries = self.lock();
            let doomed: Vec<CacheKey> = entries
                .values()
                .filter(|entry| predicate(entry))
                .map(|entry| entry.key.clone())
                .collect();
            doomed
                .iter()
                .filter_map(|key| entries.remove(key))
                .collect()
        };

        let count = removed.len();
        self.evict(removed);
        count
    }

    /// Cached keys, optionally filtered by origin, sorted.
    pub fn keys(&self, origin: Option<Origin>) -> Vec<CacheKey> {
        let entries = self.lock();
        let mut keys: Vec<CacheKey> = entries
            .values()
            .filter(|entry| origin.map_or(true, |o| entry.origin == o))
            .map(|entry| entry.key.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Logical reference count of `key`, without purging.
    pub fn ref_count(&self, key: &CacheKey) -> Option<u32> {
        self.lock().get(key).map(|entry| entry.ref_count)
    }

    /// Snapshot of every entry, sorted by key, without purging.
    pub fn entries(&self) -> Vec<CacheEntryInfo> {
        let now = Instant::now();
        let entries = self.lock();
        let mut infos: Vec<CacheEntryInfo> = entries.values().map(|e| e.info(now)).collect();
        infos.sort_by(|a, b| a.key.cmp(&b.key));
        infos
    }

    /// Aggregate counts by lifetime state and origin, without purging.
    pub fn stats(&self) -> CacheStats {
        let now = Instant::now();
        let entries = self.lock();
        let mut stats = CacheStats {
            total_entries: entries.len(),
            ..Default::default()
        };

        for entry in entries.values() {
            let held = entry.ref_count > 0;
            if held {
                stats.held_entries += 1;
            }
            if entry.expires_at.is_some() {
                stats.expiring_entries += 1;
            } else {
                stats.permanent_entries += 1;
            }
            if entry.is_expired(now) {
                stats.expired_entries += 1;
            }
            let bucket = match entry.origin {
                Origin::Local => &mut stats.local,
                Origin::Remote => &mut stats.remote,
                Origin::Unknown => continue,
            };
            bucket.entries += 1;
            if held {
                bucket.held += 1;
            }
        }

        stats
    }

    /// Number of entries, stale ones included.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
