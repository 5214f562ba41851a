//! Cache entry and statistics types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

use crate::locator::{CacheKey, Origin};
use crate::resource::ResourceHandle;

/// One cached resource. Only reachable through [`super::CacheStore`].
pub(crate) struct CacheEntry {
    pub(crate) key: CacheKey,
    pub(crate) resource: ResourceHandle,
    pub(crate) origin: Origin,
    /// Zero means permanent.
    pub(crate) ttl: Duration,
    pub(crate) expires_at: Option<Instant>,
    pub(crate) ref_count: u32,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) last_accessed: Instant,
}

impl CacheEntry {
    pub(crate) fn new(
        key: CacheKey,
        resource: ResourceHandle,
        origin: Origin,
        ttl: Duration,
        now: Instant,
    ) -> Self {
        Self {
            key,
            resource,
            origin,
            ttl,
            expires_at: Self::deadline(ttl, now),
            ref_count: 0,
            created_at: Utc::now(),
            last_accessed: now,
        }
    }

    pub(crate) fn deadline(ttl: Duration, now: Instant) -> Option<Instant> {
        if ttl.is_zero() {
            None
        } else {
            Some(now + ttl)
        }
    }

    /// Expired entries only count once nobody holds them.
    pub(crate) fn is_expired(&self, now: Instant) -> bool {
        self.ref_count == 0 && self.expires_at.is_some_and(|at| at < now)
    }

    /// Eligible for purge on the next observing pass.
    pub(crate) fn is_stale(&self, now: Instant) -> bool {
        !self.resource.is_valid() || self.is_expired(now)
    }

    /// Eligible for an explicit delete.
    pub(crate) fn is_deletable(&self) -> bool {
        !self.resource.is_valid() || self.ref_count == 0
    }

    pub(crate) fn info(&self, now: Instant) -> CacheEntryInfo {
        CacheEntryInfo {
            key: self.key.clone(),
            origin: self.origin,
            kind: self.resource.kind().to_string(),
            ref_count: self.ref_count,
            ttl_ms: self.ttl.as_millis() as u64,
            expires_in_ms: self
                .expires_at
                .map(|at| at.saturating_duration_since(now).as_millis() as u64),
            valid: self.resource.is_valid(),
            created_at: self.created_at,
            idle_ms: now.saturating_duration_since(self.last_accessed).as_millis() as u64,
        }
    }
}

/// Read-only snapshot of a cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntryInfo {
    pub key: CacheKey,
    pub origin: Origin,
    pub kind: String,
    pub ref_count: u32,
    pub ttl_ms: u64,
    /// Remaining lifetime; `None` for permanent entries.
    pub expires_in_ms: Option<u64>,
    pub valid: bool,
    pub created_at: DateTime<Utc>,
    /// Time since the entry was last returned by `get`.
    pub idle_ms: u64,
}

/// Entry counts for one origin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginStats {
    pub entries: usize,
    pub held: usize,
}

/// Cache statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub total_entries: usize,
    /// Entries with at least one logical holder.
    pub held_entries: usize,
    /// Entries with a TTL.
    pub expiring_entries: usize,
    pub permanent_entries: usize,
    /// Unheld entries past their expiry that no purge pass has seen yet.
    pub expired_entries: usize,
    pub local: OriginStats,
    pub remote: OriginStats,
}
