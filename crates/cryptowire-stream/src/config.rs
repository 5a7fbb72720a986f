/*
[INPUT]:  YAML/serde configuration values
[OUTPUT]: Validated client configuration and per-connection options
[POS]:    Configuration layer - endpoint, reconnect policy, provider selection
[UPDATE]: When adding configuration options or changing defaults
*/

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, StreamError};
use crate::types::SUPPORTED_CHAINS;

const DEFAULT_ENDPOINT: &str = "wss://echo.websocket.org";
const DEFAULT_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 3_000;
const DEFAULT_HEARTBEAT_INTERVAL_MS: u64 = 30_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Top-level client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// WebSocket endpoint (ws:// or wss://)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Sent as a bearer token on the upgrade request and on remote snapshot requests
    #[serde(default)]
    pub api_key: Option<String>,
    /// Maximum consecutive reconnect attempts before giving up
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,
    /// Base reconnect delay; attempt `n` waits `n * reconnect_interval_ms`
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,
    /// Treat a session with no inbound frame for this long as closed
    #[serde(default)]
    pub pong_timeout_ms: Option<u64>,
    /// Chains declared in the subscribe handshake
    #[serde(default = "default_chains")]
    pub chains: Vec<String>,
    #[serde(default)]
    pub provider: ProviderConfig,
}

/// Which snapshot provider backs the request facade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderConfig {
    #[default]
    Synthetic,
    Remote {
        base_url: String,
        #[serde(default = "default_request_timeout_ms")]
        timeout_ms: u64,
    },
}

/// Options recognised by `ConnectionManager::connect`
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectOptions {
    pub reconnect_attempts: u32,
    pub reconnect_interval: Duration,
    pub heartbeat_interval: Duration,
    pub pong_timeout: Option<Duration>,
    pub chains: Vec<String>,
    pub api_key: Option<String>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ClientConfig::default().connect_options()
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: None,
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            pong_timeout_ms: None,
            chains: default_chains(),
            provider: ProviderConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Create a config for an endpoint with default reconnect policy
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Build a validated configuration from an already-parsed document
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the connection manager cannot honour
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.endpoint)?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(StreamError::Config(format!(
                "endpoint must use ws:// or wss://, got {}://",
                url.scheme()
            )));
        }
        if self.reconnect_interval_ms == 0 {
            return Err(StreamError::Config(
                "reconnect_interval_ms must be positive".to_string(),
            ));
        }
        if self.heartbeat_interval_ms == 0 {
            return Err(StreamError::Config(
                "heartbeat_interval_ms must be positive".to_string(),
            ));
        }
        if self.pong_timeout_ms == Some(0) {
            return Err(StreamError::Config(
                "pong_timeout_ms must be positive when set".to_string(),
            ));
        }
        if let ProviderConfig::Remote { base_url, .. } = &self.provider {
            if base_url.trim().is_empty() {
                return Err(StreamError::Config(
                    "remote provider requires base_url".to_string(),
                ));
            }
            Url::parse(base_url)?;
        }
        Ok(())
    }

    /// Connection options derived from this configuration
    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            reconnect_attempts: self.reconnect_attempts,
            reconnect_interval: Duration::from_millis(self.reconnect_interval_ms),
            heartbeat_interval: Duration::from_millis(self.heartbeat_interval_ms),
            pong_timeout: self.pong_timeout_ms.map(Duration::from_millis),
            chains: self.chains.clone(),
            api_key: self.api_key.clone(),
        }
    }
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_reconnect_attempts() -> u32 {
    DEFAULT_RECONNECT_ATTEMPTS
}

fn default_reconnect_interval_ms() -> u64 {
    DEFAULT_RECONNECT_INTERVAL_MS
}

fn default_heartbeat_interval_ms() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_MS
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

fn default_chains() -> Vec<String> {
    SUPPORTED_CHAINS.iter().map(|chain| chain.to_string()).collect()
}
