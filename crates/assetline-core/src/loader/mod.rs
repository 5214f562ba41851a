//! Origin loaders.
//!
//! A loader turns a parsed locator into a freshly built resource. Loaders
//! never touch the cache; every failure is returned as an [`AssetError`] for
//! the coordinator to log.
//!
//! [`AssetError`]: crate::error::AssetError

mod local;
mod remote;

pub use local::LocalLoader;
pub use remote::RemoteLoader;

use async_trait::async_trait;

use crate::error::Result;
use crate::locator::ParsedLocator;
use crate::resource::{ResourceHandle, ResourceKind};

/// Fetcher for one locator origin.
#[async_trait]
pub trait OriginLoader: Send + Sync {
    async fn fetch(&self, kind: ResourceKind, locator: &ParsedLocator) -> Result<ResourceHandle>;

    /// Whether a resource fetched for `locator` may still be cached.
    ///
    /// Checked after the result has been inserted; a `false` answer makes the
    /// coordinator take the entry back out. Loaders whose sources can go away
    /// mid-fetch (an unloaded bundle) override this.
    fn is_resident(&self, _locator: &ParsedLocator) -> bool {
        true
    }
}
