//! Network transport for remote resources.
//!
//! This module provides:
//! - The batched [`Transport`] collaborator contract
//! - An HTTP implementation built on reqwest
//! - Retry logic with exponential backoff and jitter

mod http;
mod retry;
mod transport;

pub use http::HttpTransport;
pub use retry::RetryPolicy;
pub use transport::Transport;
