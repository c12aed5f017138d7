//! # 4mica Provider
//!
//! JSON-RPC over HTTP for the wallet adapter's raw `request` path. Requests
//! share one pooled `reqwest` client and pass through an optional
//! `governor` rate limiter, so a page that polls balances cannot flood a
//! public endpoint.
//!
//! ## Example
//!
//! ```ignore
//! use fourmica_provider::{presets, RpcClient};
//!
//! let client = RpcClient::new(presets::ethereum_sepolia())?;
//! let chain_id: String = client.rpc_call("eth_chainId", serde_json::json!([])).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Provider-related errors
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Invalid URL format
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid client configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// RPC error response
    #[error("RPC error: code={code}, message={message}")]
    RpcError {
        /// Error code
        code: i64,
        /// Error message
        message: String,
    },
}

/// Result type for provider operations
pub type Result<T> = std::result::Result<T, ProviderError>;

impl ProviderError {
    /// Maps this error into the SDK taxonomy, tagging it with the RPC method.
    pub fn into_error(self, method: &str) -> fourmica_error::Error {
        match self {
            ProviderError::RpcError { code, message } => {
                fourmica_error::Error::from_rpc_response(method, code, &message)
            }
            ProviderError::Http(e) if e.is_timeout() => {
                fourmica_error::Error::Timeout(format!("{method}: {e}"))
            }
            ProviderError::InvalidUrl(msg) | ProviderError::InvalidConfig(msg) => {
                fourmica_error::Error::NotConfigured(msg)
            }
            other => fourmica_error::Error::rpc(method, other),
        }
    }
}

/// Configuration for an RPC endpoint
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// RPC URL
    pub url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
    /// Maximum requests per second, `None` disables rate limiting
    pub requests_per_second: Option<u32>,
    /// Burst size on top of the steady rate
    pub burst_size: u32,
}

impl ProviderConfig {
    /// Creates a new provider configuration with the given URL
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            requests_per_second: Some(10),
            burst_size: 20,
        }
    }

    /// Sets the request timeout
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Sets the steady request rate and burst
    pub fn with_rate_limit(mut self, requests_per_second: u32, burst_size: u32) -> Self {
        self.requests_per_second = Some(requests_per_second);
        self.burst_size = burst_size;
        self
    }

    /// Disables rate limiting
    pub fn without_rate_limit(mut self) -> Self {
        self.requests_per_second = None;
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.url).map_err(|e| ProviderError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ProviderError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                url.scheme()
            )));
        }
        if self.requests_per_second == Some(0) || self.burst_size == 0 {
            return Err(ProviderError::InvalidConfig(
                "rate limit and burst must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::new("http://localhost:8545")
    }
}

/// RPC request payload
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest<T: Serialize> {
    /// JSON-RPC version
    pub jsonrpc: &'static str,
    /// Method name
    pub method: String,
    /// Parameters
    pub params: T,
    /// Request ID
    pub id: u64,
}

impl<T: Serialize> JsonRpcRequest<T> {
    /// Creates a new JSON-RPC request
    pub fn new(method: impl Into<String>, params: T, id: u64) -> Self {
        Self {
            jsonrpc: "2.0",
            method: method.into(),
            params,
            id,
        }
    }
}

/// RPC response payload.
///
/// `result` stays raw JSON: a `null` result is a valid answer for methods
/// like `wallet_switchEthereumChain`.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    /// Response ID
    pub id: u64,
    /// Result (if successful)
    #[serde(default)]
    pub result: serde_json::Value,
    /// Error (if failed)
    pub error: Option<JsonRpcError>,
}

/// RPC error object
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i64,
    /// Error message
    pub message: String,
    /// Additional data
    pub data: Option<serde_json::Value>,
}

/// HTTP JSON-RPC client with connection pooling and rate limiting
pub struct RpcClient {
    url: String,
    client: Client,
    rate_limiter: Option<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    request_id: AtomicU64,
}

impl RpcClient {
    /// Creates a client for the endpoint in `config`
    pub fn new(config: ProviderConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(format!("4mica/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        let rate_limiter = match config.requests_per_second {
            Some(rps) => {
                let rate = NonZeroU32::new(rps)
                    .ok_or_else(|| ProviderError::InvalidConfig("zero rate".to_string()))?;
                let burst = NonZeroU32::new(config.burst_size)
                    .ok_or_else(|| ProviderError::InvalidConfig("zero burst".to_string()))?;
                Some(RateLimiter::direct(Quota::per_second(rate).allow_burst(burst)))
            }
            None => None,
        };

        Ok(Self {
            url: config.url,
            client,
            rate_limiter,
            request_id: AtomicU64::new(1),
        })
    }

    /// Endpoint this client talks to
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Makes a JSON-RPC request
    pub async fn rpc_call<P, R>(&self, method: &str, params: P) -> Result<R>
    where
        P: Serialize,
        R: DeserializeOwned,
    {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let request = JsonRpcRequest::new(method, params, id);
        tracing::trace!(method, id, "sending JSON-RPC request");

        let response = self.client.post(&self.url).json(&request).send().await?;
        let rpc_response: JsonRpcResponse = response.json().await?;

        if let Some(error) = rpc_response.error {
            tracing::debug!(method, code = error.code, "JSON-RPC error response");
            return Err(ProviderError::RpcError {
                code: error.code,
                message: error.message,
            });
        }

        Ok(serde_json::from_value(rpc_response.result)?)
    }

    /// Returns the number of requests made
    pub fn request_count(&self) -> u64 {
        self.request_id.load(Ordering::SeqCst) - 1
    }
}

impl std::fmt::Debug for RpcClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("url", &self.url)
            .field("request_count", &self.request_count())
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish()
    }
}

/// Provider presets for the networks the registration page supports
pub mod presets {
    use super::ProviderConfig;

    /// Ethereum Sepolia testnet
    pub fn ethereum_sepolia() -> ProviderConfig {
        ProviderConfig::new("https://ethereum-sepolia-rpc.publicnode.com").with_timeout(30)
    }

    /// Polygon Amoy testnet
    pub fn polygon_amoy() -> ProviderConfig {
        ProviderConfig::new("https://rpc-amoy.polygon.technology").with_timeout(30)
    }

    /// Local node (anvil / hardhat)
    pub fn local() -> ProviderConfig {
        ProviderConfig::default().without_rate_limit()
    }
}
