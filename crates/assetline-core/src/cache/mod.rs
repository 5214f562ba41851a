//! Reference-counted resource cache with lazy TTL expiry.
//!
//! Each entry holds exactly one native reference on its resource for as long as
//! it exists, and a separate logical reference count for callers. Unheld
//! entries expire after their TTL, but only a purge pass (`get`, `has`,
//! `clear_unused`) actually removes them.

mod store;
mod types;

pub use store::CacheStore;
pub use types::{CacheEntryInfo, CacheStats, OriginStats};
