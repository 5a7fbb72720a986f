/*
[INPUT]:  Raw WebSocket frame text
[OUTPUT]: Decoded InboundMessage envelopes and encoded control messages
[POS]:    WebSocket layer - message parsing and validation
[UPDATE]: When adding new message types or changing the envelope format
*/

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Result, StreamError};

const DECODE_FAIL_LOG_LIMIT: usize = 3;
const UNKNOWN_CHANNEL_LOG_LIMIT: usize = 3;
const RAW_LOG_MAX_BYTES: usize = 1024;

static DECODE_FAIL_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);
static UNKNOWN_CHANNEL_LOG_COUNT: AtomicUsize = AtomicUsize::new(0);

/// Channels the server pushes on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    WhaleTransactions,
    MarketPredictions,
    AnomalyAlerts,
    NetworkMetrics,
    CrossChainCorrelations,
}

impl Channel {
    pub const ALL: [Channel; 5] = [
        Channel::WhaleTransactions,
        Channel::MarketPredictions,
        Channel::AnomalyAlerts,
        Channel::NetworkMetrics,
        Channel::CrossChainCorrelations,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Channel::WhaleTransactions => "whale_transactions",
            Channel::MarketPredictions => "market_predictions",
            Channel::AnomalyAlerts => "anomaly_alerts",
            Channel::NetworkMetrics => "network_metrics",
            Channel::CrossChainCorrelations => "cross_chain_correlations",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|channel| channel.as_str() == name)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for Channel {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Server-pushed envelope: `{ "type": <channel>, "payload": <any> }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(rename = "type")]
    pub channel: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl InboundMessage {
    /// Control replies that are consumed by the connection itself
    pub fn is_pong(&self) -> bool {
        self.channel == "pong"
    }
}

/// Client control messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    Subscribe {
        channels: Vec<String>,
        chains: Vec<String>,
    },
    Ping,
}

impl OutboundMessage {
    pub fn to_text(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Decode one text frame into an envelope.
///
/// Failures are logged (sampled) and returned as `StreamError::Decode`; the caller drops them.
pub fn decode_frame(text: &str) -> Result<InboundMessage> {
    match serde_json::from_str::<InboundMessage>(text) {
        Ok(message) => {
            if !message.is_pong() && Channel::from_name(&message.channel).is_none() {
                log_unknown_channel_once(&message.channel, text);
            }
            Ok(message)
        }
        Err(err) => {
            log_decode_fail_once(&err, text);
            Err(StreamError::Decode(err.to_string()))
        }
    }
}

fn log_unknown_channel_once(channel: &str, raw: &str) {
    let count = UNKNOWN_CHANNEL_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < UNKNOWN_CHANNEL_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = UNKNOWN_CHANNEL_LOG_LIMIT,
            channel,
            bytes = raw.len(),
            "ws message channel unrecognized"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = UNKNOWN_CHANNEL_LOG_LIMIT,
            message = %preview,
            "ws message channel unrecognized"
        );
    }
}

fn log_decode_fail_once(err: &serde_json::Error, raw: &str) {
    let count = DECODE_FAIL_LOG_COUNT.fetch_add(1, Ordering::Relaxed);
    if count < DECODE_FAIL_LOG_LIMIT {
        info!(
            sample_index = count + 1,
            sample_limit = DECODE_FAIL_LOG_LIMIT,
            error = %err,
            bytes = raw.len(),
            "ws message decode failed"
        );
        let preview = truncate_for_log(raw, RAW_LOG_MAX_BYTES);
        debug!(
            sample_index = count + 1,
            sample_limit = DECODE_FAIL_LOG_LIMIT,
            error = %err,
            message = %preview,
            "ws message decode failed"
        );
    }
}

fn truncate_for_log(value: &str, max_len: usize) -> String {
    if value.len() <= max_len {
        return value.to_string();
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = String::with_capacity(end + 3);
    out.push_str(&value[..end]);
    out.push_str("...");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_envelope() {
        let message =
            decode_frame(r#"{"type":"anomaly_alerts","payload":{"id":"a1"}}"#).unwrap();
        assert_eq!(message.channel, "anomaly_alerts");
        assert_eq!(message.payload["id"], "a1");
    }

    #[test]
    fn test_decode_missing_payload_defaults_to_null() {
        let message = decode_frame(r#"{"type":"pong"}"#).unwrap();
        assert!(message.is_pong());
        assert!(message.payload.is_null());
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(matches!(decode_frame("not json"), Err(StreamError::Decode(_))));
        assert!(matches!(
            decode_frame(r#"{"payload":1}"#),
            Err(StreamError::Decode(_))
        ));
        assert!(matches!(decode_frame(r#"[1,2]"#), Err(StreamError::Decode(_))));
    }

    #[test]
    fn test_outbound_wire_format() {
        let subscribe = OutboundMessage::Subscribe {
            channels: vec!["whale_transactions".to_string()],
            chains: vec!["bitcoin".to_string()],
        };
        let value: serde_json::Value =
            serde_json::from_str(&subscribe.to_text().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "type": "subscribe",
                "channels": ["whale_transactions"],
                "chains": ["bitcoin"]
            })
        );

        assert_eq!(OutboundMessage::Ping.to_text().unwrap(), r#"{"type":"ping"}"#);
    }

    #[test]
    fn test_channel_names_roundtrip() {
        for channel in Channel::ALL {
            assert_eq!(Channel::from_name(channel.as_str()), Some(channel));
        }
        assert_eq!(Channel::from_name("gas_prices"), None);
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundary() {
        let text = "ééé";
        let truncated = truncate_for_log(text, 3);
        assert_eq!(truncated, "é...");
    }
}
