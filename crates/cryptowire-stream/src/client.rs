/*
[INPUT]:  ClientConfig, optional Connector / SnapshotProvider overrides
[OUTPUT]: One client object: push subscriptions, liveness, snapshot requests
[POS]:    Client facade - lifecycle owner for registry, connection and provider
[UPDATE]: When adding facade operations or changing construction
*/

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::debug;

use crate::config::ClientConfig;
use crate::error::Result;
use crate::provider::{self, SnapshotProvider};
use crate::types::{AnomalyAlert, MarketCorrelation, MarketPrediction, NetworkMetrics, WhaleTransaction};
use crate::ws::{
    Callback, ConnectionEvent, ConnectionManager, ConnectionState, Connector, SubscriptionRegistry,
    TungsteniteConnector,
};

/// Streaming + request client.
///
/// Constructed explicitly and owned by whoever drives its lifecycle; there is no shared
/// global instance.
#[derive(Debug)]
pub struct CryptoWireClient {
    config: ClientConfig,
    registry: SubscriptionRegistry,
    connection: ConnectionManager,
    provider: Arc<dyn SnapshotProvider>,
}

impl CryptoWireClient {
    /// Validate `config` and build a client using the real WebSocket transport.
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let provider = provider::from_config(&config)?;
        Ok(Self::with_parts(
            config,
            Arc::new(TungsteniteConnector::new()),
            provider,
        ))
    }

    /// Build a client from explicit parts (used by tests and alternate transports).
    pub fn with_parts(
        config: ClientConfig,
        connector: Arc<dyn Connector>,
        provider: Arc<dyn SnapshotProvider>,
    ) -> Self {
        let registry = SubscriptionRegistry::new();
        let connection = ConnectionManager::new(connector, registry.clone());
        Self {
            config,
            registry,
            connection,
            provider,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Start the supervised connection. Never fails; watch [`Self::state`] instead.
    pub fn connect(&self) {
        self.connection
            .connect(&self.config.endpoint, self.config.connect_options());
    }

    /// Close the connection, cancel timers and drop every subscription.
    pub async fn disconnect(&self) {
        self.connection.disconnect().await;
    }

    pub fn is_active(&self) -> bool {
        self.connection.is_active()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }

    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.connection.events()
    }

    pub fn pending_timers(&self) -> usize {
        self.connection.pending_timers()
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Register `callback` for pushes on `channel`.
    ///
    /// A channel seen for the first time while connected is declared to the server at once;
    /// otherwise it is declared on the next (re)connect.
    pub fn subscribe(&self, channel: impl AsRef<str>, callback: Callback) {
        let channel = channel.as_ref();
        let created = self.registry.subscribe(channel, callback);
        if created
            && self.connection.is_active()
            && let Err(err) = self.connection.request_channel(channel)
        {
            debug!(channel, error = %err, "deferred channel declaration to next connect");
        }
    }

    pub fn unsubscribe(&self, channel: impl AsRef<str>, callback: &Callback) -> bool {
        self.registry.unsubscribe(channel.as_ref(), callback)
    }

    pub async fn detect_whale_movements(&self, chain: &str) -> Result<Vec<WhaleTransaction>> {
        self.provider.detect_whale_movements(chain).await
    }

    pub async fn get_network_metrics(&self, chain: &str) -> Result<NetworkMetrics> {
        self.provider.get_network_metrics(chain).await
    }

    pub async fn detect_anomalies(&self) -> Result<Vec<AnomalyAlert>> {
        self.provider.detect_anomalies().await
    }

    pub async fn analyze_cross_chain_correlations(&self) -> Result<Vec<MarketCorrelation>> {
        self.provider.analyze_cross_chain_correlations().await
    }

    pub async fn generate_market_predictions(
        &self,
        chains: &[String],
    ) -> Result<Vec<MarketPrediction>> {
        self.provider.generate_market_predictions(chains).await
    }
}
