//! HTTP implementation of [`Transport`].

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::try_join_all;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::retry::RetryPolicy;
use super::transport::Transport;
use crate::config::{NetworkDefaults, PipelineConfig};
use crate::error::{AssetError, Result};

/// Fetches payloads over HTTP(S), retrying transient failures.
pub struct HttpTransport {
    client: Client,
    retry: RetryPolicy,
}

impl HttpTransport {
    /// Create a transport with default timeout and retry settings.
    pub fn new() -> Result<Self> {
        Self::with_settings(
            Duration::from_millis(NetworkDefaults::REQUEST_TIMEOUT_MS),
            NetworkDefaults::USER_AGENT,
            RetryPolicy::default(),
        )
    }

    /// Build a client with the timeout, user agent and retry settings of `config`.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::with_settings(
            config.request_timeout(),
            &config.user_agent,
            RetryPolicy::from_config(config),
        )
    }

    /// Build a client with an explicit timeout, user agent and retry policy.
    pub fn with_settings(timeout: Duration, user_agent: &str, retry: RetryPolicy) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| AssetError::Transport {
                url: String::new(),
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self { client, retry })
    }

    /// Get a reference to the underlying reqwest client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    async fn fetch_once(&self, url: &str) -> Result<Bytes> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AssetError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        debug!("Fetched {} ({} bytes)", url, bytes.len());
        Ok(bytes)
    }

    async fn fetch_one(&self, url: &str) -> Result<Bytes> {
        let parsed = url::Url::parse(url).map_err(|e| {
            AssetError::transport(url, format!("invalid URL: {}", e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AssetError::transport(
                url,
                format!("unsupported scheme '{}'", parsed.scheme()),
            ));
        }

        self.retry.run(url, || self.fetch_once(url)).await
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch_all(&self, urls: &[String]) -> Result<Vec<Bytes>> {
        try_join_all(urls.iter().map(|url| self.fetch_one(url))).await
    }
}
