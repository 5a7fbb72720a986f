/*
[INPUT]:  Error sources (transport, decoding, snapshot requests, configuration)
[OUTPUT]: Structured error types with retry hints
[POS]:    Error handling layer - unified error type for the entire crate
[UPDATE]: When adding new error sources or improving error messages
*/

use thiserror::Error;

/// Main error type for the CryptoWire stream client
#[derive(Error, Debug)]
pub enum StreamError {
    /// Transport failed to establish or was closed unexpectedly
    #[error("Connection error: {0}")]
    Connection(String),

    /// Reconnect schedule ran out of attempts
    #[error("Reconnect attempts exhausted after {attempts} attempt(s)")]
    ReconnectExhausted { attempts: u32 },

    /// Inbound frame could not be parsed into an envelope
    #[error("Decode error: {0}")]
    Decode(String),

    /// A snapshot request could not complete
    #[error("Request {operation} failed: {reason}")]
    RequestFailed {
        operation: &'static str,
        reason: String,
    },

    /// No live session to send on
    #[error("Not connected")]
    NotConnected,

    /// WebSocket protocol error
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// URL parsing failed
    #[error("Invalid URL: {0}")]
    UrlParse(#[from] url::ParseError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StreamError {
    /// Check if the error is recoverable by trying again later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StreamError::Connection(_)
                | StreamError::WebSocket(_)
                | StreamError::NotConnected
                | StreamError::RequestFailed { .. }
        )
    }

    /// Check if a snapshot request failed (as opposed to returning an empty result)
    pub fn is_request_failure(&self) -> bool {
        matches!(self, StreamError::RequestFailed { .. })
    }

    /// Build a request failure for the named facade operation
    pub fn request_failed(operation: &'static str, reason: impl ToString) -> Self {
        StreamError::RequestFailed {
            operation,
            reason: reason.to_string(),
        }
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for StreamError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        StreamError::WebSocket(err.to_string())
    }
}

/// Result type alias for stream client operations
pub type Result<T> = std::result::Result<T, StreamError>;
