/*
[INPUT]:  CryptoWireClient, MonitorConfig, shutdown token
[OUTPUT]: Logged push traffic and periodic snapshot summaries
[POS]:    Monitor core - subscription logging and poll rounds
[UPDATE]: When changing what a poll round requests or how results are summarised
*/

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use cryptowire_stream::{CryptoWireClient, RequestTracker, StreamError, callback};
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;

/// Gas price band used when reporting network metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasBucket {
    Low,
    Moderate,
    High,
}

impl GasBucket {
    pub fn from_gwei(gwei: f64) -> Self {
        if gwei > 50.0 {
            GasBucket::High
        } else if gwei > 25.0 {
            GasBucket::Moderate
        } else {
            GasBucket::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            GasBucket::Low => "low",
            GasBucket::Moderate => "moderate",
            GasBucket::High => "high",
        }
    }
}

/// What one poll round observed.
///
/// A `None` count means the request failed or was superseded; `Some(0)` is an empty result.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoundSummary {
    pub whale_count: usize,
    pub whale_usd_total: f64,
    pub metrics_reported: usize,
    pub gas: Vec<(String, GasBucket)>,
    pub anomaly_count: Option<usize>,
    pub correlation_count: Option<usize>,
    pub prediction_count: Option<usize>,
    pub failures: usize,
    pub superseded: usize,
}

enum Miss {
    Superseded,
    Failed(StreamError),
}

impl RoundSummary {
    fn record_miss(&mut self, operation: &'static str, scope: &str, miss: Miss) {
        match miss {
            Miss::Superseded => {
                self.superseded += 1;
                debug!(operation, scope, "stale result discarded");
            }
            Miss::Failed(err) => {
                self.failures += 1;
                warn!(operation, scope, error = %err, "analysis failed");
            }
        }
    }
}

/// Headless consumer of a [`CryptoWireClient`]. Cloning shares state.
#[derive(Debug, Clone)]
pub struct Monitor {
    client: Arc<CryptoWireClient>,
    config: Arc<MonitorConfig>,
    trackers: Arc<Mutex<HashMap<String, RequestTracker>>>,
    rounds_completed: Arc<AtomicU64>,
}

impl Monitor {
    pub fn new(client: Arc<CryptoWireClient>, config: MonitorConfig) -> Self {
        Self {
            client,
            config: Arc::new(config),
            trackers: Arc::new(Mutex::new(HashMap::new())),
            rounds_completed: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn client(&self) -> &CryptoWireClient {
        &self.client
    }

    pub fn rounds_completed(&self) -> u64 {
        self.rounds_completed.load(Ordering::SeqCst)
    }

    /// Register a logging callback on every configured channel
    pub fn subscribe_channels(&self) {
        for channel in &self.config.channels {
            let name = channel.clone();
            self.client.subscribe(
                channel,
                callback(move |payload| {
                    info!(channel = %name, records = record_count(payload), "push received");
                    debug!(channel = %name, %payload, "push payload");
                }),
            );
        }
        info!(channels = ?self.config.channels, "channel loggers registered");
    }

    /// Connect, poll on the configured interval, and disconnect once `shutdown` fires.
    pub async fn run(&self, shutdown: CancellationToken) {
        self.subscribe_channels();
        self.client.connect();

        let mut state_rx = self.client.watch_state();
        let mut ticker = tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut rounds = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let monitor = self.clone();
                    rounds.spawn(async move { monitor.poll_round().await });
                }
                Ok(()) = state_rx.changed() => {
                    let state = *state_rx.borrow_and_update();
                    info!(%state, "stream state changed");
                }
                Some(joined) = rounds.join_next() => {
                    if let Err(err) = joined {
                        warn!(error = %err, "poll round task failed");
                    }
                }
            }
        }

        rounds.abort_all();
        self.client.disconnect().await;
        info!(rounds = self.rounds_completed(), "monitor stopped");
    }

    /// Request every snapshot once and log a summary
    pub async fn poll_round(&self) -> RoundSummary {
        let mut summary = RoundSummary::default();

        for chain in &self.config.chains {
            match self
                .track(
                    format!("whales:{chain}"),
                    self.client.detect_whale_movements(chain),
                )
                .await
            {
                Ok(whales) => {
                    let usd_total: f64 = whales.iter().map(|whale| whale.amount_usd).sum();
                    summary.whale_count += whales.len();
                    summary.whale_usd_total += usd_total;
                    info!(chain = %chain, count = whales.len(), usd_total, "whale movements");
                }
                Err(miss) => summary.record_miss("detect_whale_movements", chain, miss),
            }

            match self
                .track(
                    format!("metrics:{chain}"),
                    self.client.get_network_metrics(chain),
                )
                .await
            {
                Ok(metrics) => {
                    summary.metrics_reported += 1;
                    let bucket = metrics.gas_price_gwei.map(GasBucket::from_gwei);
                    info!(
                        chain = %chain,
                        block_height = metrics.block_height,
                        sentiment = ?metrics.sentiment,
                        gas_gwei = ?metrics.gas_price_gwei,
                        gas = bucket.map(GasBucket::as_str).unwrap_or("n/a"),
                        "network metrics"
                    );
                    if let Some(bucket) = bucket {
                        summary.gas.push((chain.clone(), bucket));
                    }
                }
                Err(miss) => summary.record_miss("get_network_metrics", chain, miss),
            }
        }

        match self
            .track("anomalies".to_string(), self.client.detect_anomalies())
            .await
        {
            Ok(alerts) => {
                summary.anomaly_count = Some(alerts.len());
                if alerts.is_empty() {
                    info!("no anomalies detected");
                }
                for alert in &alerts {
                    warn!(
                        chain = %alert.chain,
                        kind = ?alert.kind,
                        severity = ?alert.severity,
                        confidence = alert.confidence,
                        "{}",
                        alert.description
                    );
                }
            }
            Err(miss) => summary.record_miss("detect_anomalies", "all", miss),
        }

        match self
            .track(
                "correlations".to_string(),
                self.client.analyze_cross_chain_correlations(),
            )
            .await
        {
            Ok(correlations) => {
                summary.correlation_count = Some(correlations.len());
                for correlation in &correlations {
                    info!(
                        chains = ?correlation.chains,
                        correlation = correlation.correlation,
                        strength = ?correlation.strength,
                        opportunity = ?correlation.opportunity,
                        "cross-chain correlation"
                    );
                }
            }
            Err(miss) => summary.record_miss("analyze_cross_chain_correlations", "all", miss),
        }

        match self
            .track(
                "predictions".to_string(),
                self.client.generate_market_predictions(&self.config.chains),
            )
            .await
        {
            Ok(predictions) => {
                summary.prediction_count = Some(predictions.len());
                for prediction in &predictions {
                    info!(
                        chain = %prediction.chain,
                        direction = ?prediction.direction,
                        confidence = prediction.confidence,
                        timeframe = %prediction.timeframe,
                        "market prediction"
                    );
                }
            }
            Err(miss) => summary.record_miss("generate_market_predictions", "all", miss),
        }

        self.rounds_completed.fetch_add(1, Ordering::SeqCst);
        info!(
            whales = summary.whale_count,
            whale_usd_total = summary.whale_usd_total,
            anomalies = ?summary.anomaly_count,
            failures = summary.failures,
            superseded = summary.superseded,
            "poll round complete"
        );
        summary
    }

    async fn track<T>(
        &self,
        key: String,
        request: impl Future<Output = cryptowire_stream::Result<T>>,
    ) -> Result<T, Miss> {
        let tracker = self
            .trackers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .clone();

        match tracker.run_latest(request).await {
            Some(Ok(value)) => Ok(value),
            Some(Err(err)) => Err(Miss::Failed(err)),
            None => Err(Miss::Superseded),
        }
    }
}

fn record_count(payload: &serde_json::Value) -> usize {
    match payload {
        serde_json::Value::Array(items) => items.len(),
        serde_json::Value::Null => 0,
        _ => 1,
    }
}
