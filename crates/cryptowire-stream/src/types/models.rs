/*
[INPUT]:  Snapshot schema definitions and serde requirements
[OUTPUT]: Typed Rust structs with serialization support
[POS]:    Data layer - immutable, timestamped observation records
[UPDATE]: When the snapshot schema changes or new record types are added
*/

use serde::{Deserialize, Serialize};

use super::enums::{
    AnomalyKind, CorrelationStrength, Direction, Opportunity, Sentiment, Severity, WhalePattern,
};

/// A single large transfer flagged by whale detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WhaleTransaction {
    pub id: String,
    pub chain: String,
    pub hash: String,
    pub from: String,
    pub to: String,
    pub amount: f64,
    #[serde(rename = "amountUSD")]
    pub amount_usd: f64,
    /// Epoch milliseconds
    pub timestamp: i64,
    pub confidence: f64,
    pub pattern: WhalePattern,
    pub impact_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkMetrics {
    pub chain: String,
    pub block_height: u64,
    pub tx_count_24h: u64,
    /// Seconds
    pub avg_block_time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_hashrate: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gas_price_gwei: Option<f64>,
    pub active_addresses: u64,
    pub whale_activity_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge_volume_24h: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defi_tvl: Option<f64>,
    pub sentiment: Sentiment,
    pub momentum_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnomalyAlert {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub chain: String,
    pub description: String,
    pub confidence: f64,
    pub predicted_impact: Sentiment,
    pub time_window: String,
    /// Epoch milliseconds
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketCorrelation {
    pub chains: Vec<String>,
    pub correlation: f64,
    pub timeframe: String,
    pub strength: CorrelationStrength,
    pub opportunity: Opportunity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketPrediction {
    pub id: String,
    pub chain: String,
    pub symbol: String,
    pub direction: Direction,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_target: Option<f64>,
    pub timeframe: String,
    pub reasoning: String,
    pub model_version: String,
    pub features: Vec<String>,
}
