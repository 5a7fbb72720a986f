/*
[INPUT]:  Snapshot schema definitions and serde requirements
[OUTPUT]: Typed Rust enums with serialization support
[POS]:    Data layer - categorical fields of snapshot records
[UPDATE]: When the snapshot schema changes or new categories are added
*/

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WhalePattern {
    Accumulation,
    Distribution,
    Transfer,
}

impl WhalePattern {
    pub const ALL: [WhalePattern; 3] = [
        WhalePattern::Accumulation,
        WhalePattern::Distribution,
        WhalePattern::Transfer,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Bullish,
    Bearish,
    Neutral,
}

impl Sentiment {
    pub const ALL: [Sentiment; 3] = [Sentiment::Bullish, Sentiment::Bearish, Sentiment::Neutral];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    WhaleMovement,
    GasSpike,
    BridgeSurge,
    DefiDrainage,
    UnusualVolume,
}

impl AnomalyKind {
    pub const ALL: [AnomalyKind; 5] = [
        AnomalyKind::WhaleMovement,
        AnomalyKind::GasSpike,
        AnomalyKind::BridgeSurge,
        AnomalyKind::DefiDrainage,
        AnomalyKind::UnusualVolume,
    ];

    /// Human-readable alert text for this kind on `chain`
    pub fn describe(self, chain: &str) -> String {
        match self {
            AnomalyKind::WhaleMovement => format!(
                "Unusual large transaction activity detected on {chain} - 500% above normal"
            ),
            AnomalyKind::GasSpike => {
                format!("Gas prices on {chain} increased by 300% in last 10 minutes")
            }
            AnomalyKind::BridgeSurge => {
                format!("Cross-chain bridge volume to {chain} up 800% - major capital flow")
            }
            AnomalyKind::DefiDrainage => {
                format!("DeFi protocols on {chain} experiencing unusual liquidity withdrawal")
            }
            AnomalyKind::UnusualVolume => {
                format!("Trading volume on {chain} DEXs up 600% - investigating catalyst")
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorrelationStrength {
    Weak,
    Moderate,
    Strong,
}

impl CorrelationStrength {
    /// Bucket a correlation coefficient by magnitude
    pub fn from_coefficient(coefficient: f64) -> Self {
        let magnitude = coefficient.abs();
        if magnitude >= 0.7 {
            CorrelationStrength::Strong
        } else if magnitude >= 0.4 {
            CorrelationStrength::Moderate
        } else {
            CorrelationStrength::Weak
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Opportunity {
    Arbitrage,
    Trend,
    Divergence,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Sideways,
}

impl Direction {
    pub const ALL: [Direction; 3] = [Direction::Up, Direction::Down, Direction::Sideways];
}
