/*
[INPUT]:  Chain identifiers and provider configuration
[OUTPUT]: Freshly produced snapshot records
[POS]:    Request facade - swappable snapshot sources
[UPDATE]: When adding snapshot operations or provider variants
*/

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{ClientConfig, ProviderConfig};
use crate::error::Result;
use crate::types::{AnomalyAlert, MarketCorrelation, MarketPrediction, NetworkMetrics, WhaleTransaction};

pub mod remote;
pub mod synthetic;

pub use remote::RemoteProvider;
pub use synthetic::{LatencyProfile, SyntheticProvider};

/// Source of on-demand snapshots.
///
/// An empty `Vec` is a successful result; failures are `StreamError::RequestFailed`.
#[async_trait]
pub trait SnapshotProvider: Send + Sync + fmt::Debug {
    /// 1-3 whale transfers observed on `chain`
    async fn detect_whale_movements(&self, chain: &str) -> Result<Vec<WhaleTransaction>>;

    /// Exactly one metrics record for `chain`
    async fn get_network_metrics(&self, chain: &str) -> Result<NetworkMetrics>;

    async fn detect_anomalies(&self) -> Result<Vec<AnomalyAlert>>;

    async fn analyze_cross_chain_correlations(&self) -> Result<Vec<MarketCorrelation>>;

    /// Zero or one prediction per requested chain
    async fn generate_market_predictions(&self, chains: &[String]) -> Result<Vec<MarketPrediction>>;
}

/// Build the provider selected by `config.provider`
pub fn from_config(config: &ClientConfig) -> Result<Arc<dyn SnapshotProvider>> {
    match &config.provider {
        ProviderConfig::Synthetic => Ok(Arc::new(SyntheticProvider::new())),
        ProviderConfig::Remote {
            base_url,
            timeout_ms,
        } => Ok(Arc::new(RemoteProvider::new(
            base_url,
            config.api_key.clone(),
            Duration::from_millis(*timeout_ms),
        )?)),
    }
}
