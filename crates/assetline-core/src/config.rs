//! Centralized configuration for the asset pipeline.
//!
//! Constant tables live on unit structs; the runtime-tunable subset is
//! [`PipelineConfig`], which can be read from a JSON file.

use crate::error::{AssetError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Cache-related defaults.
pub struct CacheDefaults;

impl CacheDefaults {
    /// Default time-to-live of an unheld cache entry (5 minutes).
    pub const DEFAULT_TTL_MS: u64 = 300_000;
    /// Name of the bundle used by `l:name` locators without a bundle segment.
    pub const DEFAULT_BUNDLE: &'static str = "resources";
}

/// Network-related defaults.
pub struct NetworkDefaults;

impl NetworkDefaults {
    pub const REQUEST_TIMEOUT_MS: u64 = 15_000;
    pub const MAX_RETRIES: u32 = 3;
    pub const RETRY_BASE_DELAY_MS: u64 = 500;
    pub const USER_AGENT: &'static str = "assetline/0.1";
}

/// Path suffixes the local loader appends for role-specific requests.
pub struct RoleMarker;

impl RoleMarker {
    /// Requests a displayable surface (sprite frame) of an image item.
    pub const SPRITE_FRAME: &'static str = "spriteFrame";
    /// Requests the raw texture of an image item.
    pub const TEXTURE: &'static str = "texture";
}

/// Runtime configuration of an [`crate::AssetPipeline`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct PipelineConfig {
    /// TTL applied when `LoadOptions` carries none. `0` caches permanently.
    pub default_ttl_ms: u64,
    /// Bundle selected by `l:name` locators.
    pub default_bundle: String,
    /// Root directory of the filesystem bundle registry, if one is used.
    pub bundle_root: Option<PathBuf>,
    /// Per-request timeout of the HTTP transport.
    pub request_timeout_ms: u64,
    /// Attempts per URL (including the first one).
    pub max_retries: u32,
    /// Initial backoff between transport retries.
    pub retry_base_delay_ms: u64,
    pub user_agent: String,
    /// Default concurrency for `load_parallel` callers that don't pick one.
    pub parallel_concurrency: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_ttl_ms: CacheDefaults::DEFAULT_TTL_MS,
            default_bundle: CacheDefaults::DEFAULT_BUNDLE.to_string(),
            bundle_root: None,
            request_timeout_ms: NetworkDefaults::REQUEST_TIMEOUT_MS,
            max_retries: NetworkDefaults::MAX_RETRIES,
            retry_base_delay_ms: NetworkDefaults::RETRY_BASE_DELAY_MS,
            user_agent: NetworkDefaults::USER_AGENT.to_string(),
            parallel_concurrency: 0,
        }
    }
}

impl PipelineConfig {
    /// Read a configuration from a JSON file. Missing fields take defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text =
            std::fs::read_to_string(path).map_err(|e| AssetError::io_with_path(e, path))?;
        let config: PipelineConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.default_bundle.trim().is_empty() {
            return Err(AssetError::Config {
                message: "default_bundle must not be empty".to_string(),
            });
        }
        if self.default_bundle.contains('@') {
            return Err(AssetError::Config {
                message: format!("default_bundle '{}' must not contain '@'", self.default_bundle),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(AssetError::Config {
                message: "request_timeout_ms must be greater than zero".to_string(),
            });
        }
        if self.max_retries == 0 {
            return Err(AssetError::Config {
                message: "max_retries must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// TTL applied when a load does not specify one.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_millis(self.default_ttl_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}
