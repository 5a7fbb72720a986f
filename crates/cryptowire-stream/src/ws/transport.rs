/*
[INPUT]:  Endpoint URL, optional API key, outbound text frames
[OUTPUT]: Connected transports yielding inbound text frames
[POS]:    WebSocket layer - transport abstraction (tungstenite + scripted mock)
[UPDATE]: When changing handshake headers or frame handling
*/

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use crate::error::{Result, StreamError};

/// Opens transport sessions
#[async_trait]
pub trait Connector: Send + Sync + fmt::Debug {
    async fn connect(&self, endpoint: &str, api_key: Option<&str>) -> Result<Box<dyn Transport>>;
}

/// One open bidirectional text stream
#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> Result<()>;

    /// Next inbound text frame. `None` once the peer has closed the stream.
    ///
    /// Must be cancel safe: it is polled inside `select!`.
    async fn recv(&mut self) -> Option<Result<String>>;

    async fn close(&mut self) -> Result<()>;
}

/// Real WebSocket connector backed by tokio-tungstenite
#[derive(Debug, Clone, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, endpoint: &str, api_key: Option<&str>) -> Result<Box<dyn Transport>> {
        let mut request = endpoint.into_client_request()?;
        if let Some(key) = api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|err| StreamError::Config(format!("invalid api key: {err}")))?;
            request.headers_mut().insert("Authorization", value);
        }

        let (stream, _response) = connect_async(request)
            .await
            .map_err(|err| StreamError::Connection(err.to_string()))?;
        Ok(Box::new(TungsteniteTransport { stream }))
    }
}

struct TungsteniteTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for TungsteniteTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.stream.send(WsMessage::Text(text.into())).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        loop {
            match self.stream.next().await? {
                Ok(WsMessage::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(WsMessage::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(err) => {
                        debug!(error = %err, "dropping non-utf8 binary frame");
                    }
                },
                Ok(WsMessage::Close(_)) => return None,
                Ok(_) => {}
                Err(err) => return Some(Err(StreamError::Connection(err.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}

/// What the mock connector does on the next connect attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOutcome {
    Accept,
    Refuse(String),
}

/// Scripted connector for tests.
///
/// Outcomes are consumed in order; once the script is exhausted every attempt is refused.
/// Each accepted session is handed to the test as a [`MockPeer`].
#[derive(Clone)]
pub struct MockConnector {
    inner: Arc<Mutex<MockState>>,
    peers_tx: mpsc::UnboundedSender<MockPeer>,
}

struct MockState {
    script: VecDeque<MockOutcome>,
    attempts: Vec<MockAttempt>,
}

/// A recorded connect call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockAttempt {
    pub endpoint: String,
    pub api_key: Option<String>,
}

/// Receives the server side of each accepted mock session
#[derive(Debug)]
pub struct MockPeers {
    rx: mpsc::UnboundedReceiver<MockPeer>,
}

impl MockPeers {
    pub async fn next(&mut self) -> Option<MockPeer> {
        self.rx.recv().await
    }
}

/// Server side of an accepted mock session
#[derive(Debug)]
pub struct MockPeer {
    inbound_tx: Option<mpsc::UnboundedSender<String>>,
    outbound_rx: mpsc::UnboundedReceiver<String>,
}

impl MockPeer {
    /// Push a frame to the client. Returns `false` if the client side is gone.
    pub fn push(&self, text: impl Into<String>) -> bool {
        self.inbound_tx
            .as_ref()
            .is_some_and(|tx| tx.send(text.into()).is_ok())
    }

    /// Next frame the client sent, or `None` once the client side is gone.
    pub async fn next_sent(&mut self) -> Option<String> {
        self.outbound_rx.recv().await
    }

    /// Simulate the server dropping the connection
    pub fn close(&mut self) {
        self.inbound_tx = None;
    }
}

impl MockConnector {
    pub fn new(script: impl IntoIterator<Item = MockOutcome>) -> (Self, MockPeers) {
        let (peers_tx, rx) = mpsc::unbounded_channel();
        let connector = Self {
            inner: Arc::new(Mutex::new(MockState {
                script: script.into_iter().collect(),
                attempts: Vec::new(),
            })),
            peers_tx,
        };
        (connector, MockPeers { rx })
    }

    /// Append outcomes to the script
    pub fn push_outcomes(&self, outcomes: impl IntoIterator<Item = MockOutcome>) {
        self.state().script.extend(outcomes);
    }

    pub fn attempts(&self) -> Vec<MockAttempt> {
        self.state().attempts.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for MockConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("MockConnector")
            .field("remaining", &state.script.len())
            .field("attempts", &state.attempts.len())
            .finish()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, endpoint: &str, api_key: Option<&str>) -> Result<Box<dyn Transport>> {
        let outcome = {
            let mut state = self.state();
            state.attempts.push(MockAttempt {
                endpoint: endpoint.to_string(),
                api_key: api_key.map(str::to_string),
            });
            state
                .script
                .pop_front()
                .unwrap_or_else(|| MockOutcome::Refuse("script exhausted".to_string()))
        };

        match outcome {
            MockOutcome::Refuse(reason) => Err(StreamError::Connection(reason)),
            MockOutcome::Accept => {
                let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
                let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
                let peer = MockPeer {
                    inbound_tx: Some(inbound_tx),
                    outbound_rx,
                };
                self.peers_tx
                    .send(peer)
                    .map_err(|_| StreamError::Connection("mock peers dropped".to_string()))?;
                Ok(Box::new(MockTransport {
                    inbound_rx,
                    outbound_tx,
                }))
            }
        }
    }
}

struct MockTransport {
    inbound_rx: mpsc::UnboundedReceiver<String>,
    outbound_tx: mpsc::UnboundedSender<String>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.outbound_tx
            .send(text)
            .map_err(|_| StreamError::Connection("mock peer gone".to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String>> {
        self.inbound_rx.recv().await.map(Ok)
    }

    async fn close(&mut self) -> Result<()> {
        self.inbound_rx.close();
        Ok(())
    }
}
