//! Error types for the asset pipeline.
//!
//! Loaders and collaborators report failures through [`AssetError`]. The
//! coordinator turns them into an absent result plus a logged diagnostic, so
//! callers of the high-level `load` never see them; `try_load` surfaces them
//! for callers that want to branch on the failure kind.

use std::path::PathBuf;
use thiserror::Error;

use crate::resource::ResourceKind;

/// Main error type for the asset pipeline.
#[derive(Debug, Error)]
pub enum AssetError {
    // Locator errors
    #[error("Unresolvable locator: {locator}")]
    UnresolvableLocator { locator: String },

    // Lookup errors
    #[error("Bundle not found: {bundle}")]
    BundleNotFound { bundle: String },

    #[error("Resource not found: {locator}")]
    NotFound { locator: String },

    // Construction errors
    #[error("Resource failed validity check: {key}")]
    InvalidResource { key: String },

    #[error("Failed to construct {kind} resource: {message}")]
    Construction { kind: ResourceKind, message: String },

    // Transport errors
    #[error("Transport error for {url}: {message}")]
    Transport {
        url: String,
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, AssetError>;

impl From<std::io::Error> for AssetError {
    fn from(err: std::io::Error) -> Self {
        AssetError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for AssetError {
    fn from(err: serde_json::Error) -> Self {
        AssetError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for AssetError {
    fn from(err: reqwest::Error) -> Self {
        AssetError::Transport {
            url: err.url().map(|u| u.to_string()).unwrap_or_default(),
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl AssetError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        AssetError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a transport error without an underlying reqwest error.
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        AssetError::Transport {
            url: url.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Check if this error should trigger a transport-level retry.
    ///
    /// The coordinator itself never retries; this is consulted by the HTTP
    /// transport only.
    pub fn is_retryable(&self) -> bool {
        match self {
            AssetError::Transport { .. } => true,
            AssetError::HttpStatus { status, .. } => {
                matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
            }
            _ => false,
        }
    }

    /// Check if this error can never succeed for the same locator.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AssetError::UnresolvableLocator { .. }
                | AssetError::BundleNotFound { .. }
                | AssetError::NotFound { .. }
        )
    }
}
