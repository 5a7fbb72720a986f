/*
[INPUT]:  Analytics backend base URL, API key, request timeout
[OUTPUT]: Snapshot records fetched over HTTP, or tagged request failures
[POS]:    Request facade - real backend integration
[UPDATE]: When backend endpoints or response formats change
*/

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{Result, StreamError};
use crate::types::{AnomalyAlert, MarketCorrelation, MarketPrediction, NetworkMetrics, WhaleTransaction};

use super::SnapshotProvider;

const WHALES_PATH: &str = "v1/whales";
const METRICS_PATH: &str = "v1/metrics";
const ANOMALIES_PATH: &str = "v1/anomalies";
const CORRELATIONS_PATH: &str = "v1/correlations";
const PREDICTIONS_PATH: &str = "v1/predictions";

/// HTTP-backed [`SnapshotProvider`]
#[derive(Debug, Clone)]
pub struct RemoteProvider {
    http_client: Client,
    base_url: Url,
    api_key: Option<String>,
}

impl RemoteProvider {
    /// `timeout` bounds every request so no call stays pending indefinitely.
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| StreamError::Config(format!("http client: {err}")))?;

        Ok(Self {
            http_client,
            base_url,
            api_key,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self
            .base_url
            .join(path)
            .map_err(|err| StreamError::request_failed(operation, err))?;

        let mut builder = self.http_client.get(url).query(query);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        debug!(operation, path, "snapshot request");
        let response = builder
            .send()
            .await
            .map_err(|err| StreamError::request_failed(operation, err))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StreamError::request_failed(
                operation,
                format!("HTTP {}: {}", status.as_u16(), body),
            ));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| StreamError::request_failed(operation, err))
    }
}

#[async_trait]
impl SnapshotProvider for RemoteProvider {
    async fn detect_whale_movements(&self, chain: &str) -> Result<Vec<WhaleTransaction>> {
        self.get_json("detect_whale_movements", WHALES_PATH, &[("chain", chain)])
            .await
    }

    async fn get_network_metrics(&self, chain: &str) -> Result<NetworkMetrics> {
        self.get_json("get_network_metrics", METRICS_PATH, &[("chain", chain)])
            .await
    }

    async fn detect_anomalies(&self) -> Result<Vec<AnomalyAlert>> {
        self.get_json("detect_anomalies", ANOMALIES_PATH, &[]).await
    }

    async fn analyze_cross_chain_correlations(&self) -> Result<Vec<MarketCorrelation>> {
        self.get_json("analyze_cross_chain_correlations", CORRELATIONS_PATH, &[])
            .await
    }

    async fn generate_market_predictions(&self, chains: &[String]) -> Result<Vec<MarketPrediction>> {
        if chains.is_empty() {
            return Ok(Vec::new());
        }
        let joined = chains.join(",");
        self.get_json(
            "generate_market_predictions",
            PREDICTIONS_PATH,
            &[("chains", joined.as_str())],
        )
        .await
    }
}
