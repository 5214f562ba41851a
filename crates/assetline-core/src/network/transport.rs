//! Batched fetch primitive used by the remote loader.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::Result;

/// Fetches several URLs as one unit.
///
/// Either every payload arrives (in request order) or the whole call fails.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch_all(&self, urls: &[String]) -> Result<Vec<Bytes>>;
}
