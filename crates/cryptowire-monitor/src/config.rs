/*
[INPUT]:  YAML configuration file
[OUTPUT]: Parsed monitor configuration
[POS]:    Configuration layer - client settings plus polling plan
[UPDATE]: When adding new configuration options
*/

use std::path::Path;

use anyhow::{Context, ensure};
use cryptowire_stream::{Channel, ClientConfig};
use serde::{Deserialize, Serialize};

/// Top-level configuration for the monitor
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MonitorConfig {
    /// Stream client settings (endpoint, reconnect policy, provider)
    #[serde(default)]
    pub client: ClientConfig,
    /// Seconds between snapshot poll rounds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Chains polled for whales, metrics and predictions
    #[serde(default = "default_chains")]
    pub chains: Vec<String>,
    /// Push channels to log
    #[serde(default = "default_channels")]
    pub channels: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            poll_interval_secs: default_poll_interval_secs(),
            chains: default_chains(),
            channels: default_channels(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_chains() -> Vec<String> {
    ["bitcoin", "ethereum", "solana"]
        .iter()
        .map(|chain| chain.to_string())
        .collect()
}

fn default_channels() -> Vec<String> {
    Channel::ALL
        .iter()
        .map(|channel| channel.as_str().to_string())
        .collect()
}

impl MonitorConfig {
    /// Load configuration from YAML file
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(content).context("parse config yaml")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.client.validate().context("invalid client config")?;
        ensure!(self.poll_interval_secs > 0, "poll_interval_secs must be positive");
        ensure!(
            self.chains.iter().all(|chain| !chain.trim().is_empty()),
            "chains must not contain empty names"
        );
        Ok(())
    }
}
