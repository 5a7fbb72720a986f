/*
[INPUT]:  Endpoint, ConnectOptions, a Connector, the shared SubscriptionRegistry
[OUTPUT]: One supervised transport session, connection state + lifecycle events
[POS]:    WebSocket layer - connection lifecycle, heartbeat, linear reconnect backoff
[UPDATE]: When changing reconnect policy, heartbeat, or teardown semantics
*/

use std::collections::BTreeSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ConnectOptions;
use crate::error::{Result, StreamError};

use super::message::{Channel, OutboundMessage, decode_frame};
use super::registry::SubscriptionRegistry;
use super::timer::TimerTracker;
use super::transport::{Connector, Transport};

const EVENT_CAPACITY: usize = 256;
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Failed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Lifecycle notifications broadcast by the connection worker
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Connected { endpoint: String },
    ConnectFailed { attempt: u32, error: String },
    Closed { reason: String },
    ReconnectScheduled { attempt: u32, delay: Duration },
    ReconnectExhausted { attempts: u32 },
    HeartbeatSent,
    DecodeFailed { error: String },
}

/// Owns the transport session and keeps it alive.
///
/// `connect` never fails: errors surface as [`ConnectionState`] changes and
/// [`ConnectionEvent`]s. `disconnect` is the only path that clears the registry.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    registry: SubscriptionRegistry,
    shared: Arc<Shared>,
    worker: Mutex<Option<WorkerHandle>>,
}

struct WorkerHandle {
    shutdown: CancellationToken,
    handle: JoinHandle<()>,
}

struct Shared {
    state: watch::Sender<ConnectionState>,
    events: broadcast::Sender<ConnectionEvent>,
    transport_open: AtomicBool,
    timers: TimerTracker,
    outbound: Mutex<Option<mpsc::UnboundedSender<OutboundMessage>>>,
    chains: Mutex<Vec<String>>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "connection state changed");
        }
    }

    fn emit(&self, event: ConnectionEvent) {
        let _ = self.events.send(event);
    }

    fn outbound(&self) -> MutexGuard<'_, Option<mpsc::UnboundedSender<OutboundMessage>>> {
        self.outbound.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raise the open flag before publishing `Connected`.
    fn mark_open(&self, outbound_tx: mpsc::UnboundedSender<OutboundMessage>) {
        *self.outbound() = Some(outbound_tx);
        self.transport_open.store(true, Ordering::SeqCst);
        self.set_state(ConnectionState::Connected);
    }

    /// Leave `Connected` before lowering the open flag.
    fn mark_closed(&self, next: ConnectionState) {
        *self.outbound() = None;
        self.set_state(next);
        self.transport_open.store(false, Ordering::SeqCst);
    }
}

impl ConnectionManager {
    pub fn new(connector: Arc<dyn Connector>, registry: SubscriptionRegistry) -> Self {
        let (state, _rx) = watch::channel(ConnectionState::Disconnected);
        let (events, _rx) = broadcast::channel(EVENT_CAPACITY);
        Self {
            connector,
            registry,
            shared: Arc::new(Shared {
                state,
                events,
                transport_open: AtomicBool::new(false),
                timers: TimerTracker::new(),
                outbound: Mutex::new(None),
                chains: Mutex::new(Vec::new()),
            }),
            worker: Mutex::new(None),
        }
    }

    /// Start a supervised session against `endpoint`.
    ///
    /// State is `Connecting` when this returns. A second call while the worker is alive is
    /// ignored.
    pub fn connect(&self, endpoint: &str, options: ConnectOptions) {
        let mut worker = self.worker_slot();
        if worker
            .as_ref()
            .is_some_and(|existing| !existing.handle.is_finished())
        {
            debug!(endpoint, "connect ignored; connection worker already running");
            return;
        }
        *worker = None;

        if tokio::runtime::Handle::try_current().is_err() {
            warn!(endpoint, "connect called without Tokio runtime; connection not started");
            self.shared.set_state(ConnectionState::Failed);
            return;
        }

        *self.shared.chains.lock().unwrap_or_else(PoisonError::into_inner) =
            options.chains.clone();
        self.shared.set_state(ConnectionState::Connecting);

        let shutdown = CancellationToken::new();
        let task = ConnectionWorker {
            endpoint: endpoint.to_string(),
            options,
            connector: self.connector.clone(),
            registry: self.registry.clone(),
            shared: self.shared.clone(),
            shutdown: shutdown.clone(),
        };
        let handle = tokio::spawn(task.run());
        *worker = Some(WorkerHandle { shutdown, handle });
    }

    /// Stop the worker, close the transport, cancel all timers and clear subscriptions.
    pub async fn disconnect(&self) {
        let worker = self.worker_slot().take();
        if let Some(worker) = worker {
            worker.shutdown.cancel();
            if let Err(err) = worker.handle.await
                && err.is_panic()
            {
                warn!(error = %err, "connection worker panicked");
            }
        }

        self.shared.mark_closed(ConnectionState::Disconnected);
        self.registry.clear();
        info!("disconnected");
    }

    /// `Connected` with an open transport. Never blocks.
    pub fn is_active(&self) -> bool {
        *self.shared.state.borrow() == ConnectionState::Connected
            && self.shared.transport_open.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    pub fn transport_open(&self) -> bool {
        self.shared.transport_open.load(Ordering::SeqCst)
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.shared.events.subscribe()
    }

    /// Heartbeat and backoff timers currently alive
    pub fn pending_timers(&self) -> usize {
        self.shared.timers.pending()
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    /// Queue a control message on the live session
    pub fn send(&self, message: OutboundMessage) -> Result<()> {
        let outbound = self.shared.outbound();
        let Some(tx) = outbound.as_ref() else {
            return Err(StreamError::NotConnected);
        };
        tx.send(message).map_err(|_| StreamError::NotConnected)
    }

    /// Declare a single newly-subscribed channel to the server
    pub fn request_channel(&self, channel: &str) -> Result<()> {
        let chains = self
            .shared
            .chains
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        self.send(OutboundMessage::Subscribe {
            channels: vec![channel.to_string()],
            chains,
        })
    }

    fn worker_slot(&self) -> MutexGuard<'_, Option<WorkerHandle>> {
        self.worker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("connector", &self.connector)
            .field("state", &self.state())
            .field("transport_open", &self.transport_open())
            .field("registry", &self.registry)
            .finish()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        if let Some(worker) = self.worker_slot().take() {
            worker.shutdown.cancel();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionExit {
    Closed(String),
    Shutdown,
}

struct ConnectionWorker {
    endpoint: String,
    options: ConnectOptions,
    connector: Arc<dyn Connector>,
    registry: SubscriptionRegistry,
    shared: Arc<Shared>,
    shutdown: CancellationToken,
}

impl ConnectionWorker {
    async fn run(self) {
        let mut attempt: u32 = 0;

        'run: loop {
            info!(endpoint = %self.endpoint, attempt, "connecting to stream endpoint");
            let connected = tokio::select! {
                _ = self.shutdown.cancelled() => break 'run,
                result = self
                    .connector
                    .connect(&self.endpoint, self.options.api_key.as_deref()) => result,
            };

            match connected {
                Ok(transport) => {
                    attempt = 0;
                    match self.run_session(transport).await {
                        SessionExit::Shutdown => break 'run,
                        SessionExit::Closed(reason) => {
                            warn!(endpoint = %self.endpoint, %reason, "stream transport closed");
                            self.shared.emit(ConnectionEvent::Closed { reason });
                        }
                    }
                }
                Err(err) => {
                    warn!(endpoint = %self.endpoint, attempt, error = %err, "stream connect failed");
                    self.shared.emit(ConnectionEvent::ConnectFailed {
                        attempt,
                        error: err.to_string(),
                    });
                }
            }

            let Some(delay) = self.schedule_reconnect(&mut attempt) else {
                return;
            };

            tokio::select! {
                _ = self.shutdown.cancelled() => break 'run,
                _ = self.shared.timers.sleep(delay) => {}
            }
        }

        self.shared.mark_closed(ConnectionState::Disconnected);
    }

    /// Linear backoff: attempt `n` waits `n * reconnect_interval`.
    fn schedule_reconnect(&self, attempt: &mut u32) -> Option<Duration> {
        let max_attempts = self.options.reconnect_attempts;
        if *attempt >= max_attempts {
            warn!(
                endpoint = %self.endpoint,
                attempts = *attempt,
                max_attempts,
                "stream reconnect attempts exhausted"
            );
            self.shared.set_state(ConnectionState::Failed);
            self.shared
                .emit(ConnectionEvent::ReconnectExhausted { attempts: *attempt });
            return None;
        }

        *attempt += 1;
        let delay = self.options.reconnect_interval.saturating_mul(*attempt);
        info!(attempt = *attempt, max_attempts, ?delay, "scheduling stream reconnect");
        self.shared.set_state(ConnectionState::Reconnecting);
        self.shared.emit(ConnectionEvent::ReconnectScheduled {
            attempt: *attempt,
            delay,
        });
        Some(delay)
    }

    async fn run_session(&self, mut transport: Box<dyn Transport>) -> SessionExit {
        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        self.shared.mark_open(outbound_tx);
        info!(endpoint = %self.endpoint, "stream connected");
        self.shared.emit(ConnectionEvent::Connected {
            endpoint: self.endpoint.clone(),
        });

        let exit = self.drive(transport.as_mut(), &mut outbound_rx).await;

        match exit {
            SessionExit::Shutdown => {
                match tokio::time::timeout(CLOSE_TIMEOUT, transport.close()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => debug!(error = %err, "transport close failed"),
                    Err(_) => debug!("transport close timed out"),
                }
                self.shared.mark_closed(ConnectionState::Disconnected);
            }
            SessionExit::Closed(_) => {
                self.shared.mark_closed(ConnectionState::Reconnecting);
            }
        }
        exit
    }

    async fn drive(
        &self,
        transport: &mut dyn Transport,
        outbound_rx: &mut mpsc::UnboundedReceiver<OutboundMessage>,
    ) -> SessionExit {
        let subscribe = OutboundMessage::Subscribe {
            channels: self.declared_channels(),
            chains: self.options.chains.clone(),
        };
        if let Err(err) = send_message(transport, &subscribe).await {
            return SessionExit::Closed(err.to_string());
        }

        let mut heartbeat = self.shared.timers.interval(self.options.heartbeat_interval);
        let mut last_inbound = Instant::now();

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => return SessionExit::Shutdown,
                _ = heartbeat.tick() => {
                    if let Err(err) = send_message(transport, &OutboundMessage::Ping).await {
                        return SessionExit::Closed(err.to_string());
                    }
                    self.shared.emit(ConnectionEvent::HeartbeatSent);
                }
                Some(message) = outbound_rx.recv() => {
                    if let Err(err) = send_message(transport, &message).await {
                        return SessionExit::Closed(err.to_string());
                    }
                }
                frame = transport.recv() => match frame {
                    Some(Ok(text)) => {
                        last_inbound = Instant::now();
                        self.handle_frame(&text);
                    }
                    Some(Err(err)) => return SessionExit::Closed(err.to_string()),
                    None => return SessionExit::Closed("closed by peer".to_string()),
                },
                _ = inbound_deadline(self.options.pong_timeout, last_inbound) => {
                    return SessionExit::Closed("no inbound frame before pong timeout".to_string());
                }
            }
        }
    }

    /// Known channels plus every channel with local subscribers, sorted and unique
    fn declared_channels(&self) -> Vec<String> {
        let mut channels: BTreeSet<String> = Channel::ALL
            .iter()
            .map(|channel| channel.as_str().to_string())
            .collect();
        channels.extend(self.registry.channels());
        channels.into_iter().collect()
    }

    fn handle_frame(&self, text: &str) {
        match decode_frame(text) {
            Ok(message) if message.is_pong() => debug!("pong received"),
            Ok(message) => {
                self.registry.dispatch(&message.channel, &message.payload);
            }
            Err(err) => self.shared.emit(ConnectionEvent::DecodeFailed {
                error: err.to_string(),
            }),
        }
    }
}

async fn send_message(transport: &mut dyn Transport, message: &OutboundMessage) -> Result<()> {
    let text = message.to_text()?;
    debug!(message = %text, "sending control message");
    transport.send(text).await
}

async fn inbound_deadline(timeout: Option<Duration>, last_inbound: Instant) {
    match timeout {
        Some(timeout) => tokio::time::sleep_until(last_inbound + timeout).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::transport::{MockConnector, MockOutcome};

    fn options(attempts: u32, interval_ms: u64) -> ConnectOptions {
        ConnectOptions {
            reconnect_attempts: attempts,
            reconnect_interval: Duration::from_millis(interval_ms),
            ..ConnectOptions::default()
        }
    }

    #[test]
    fn test_connect_without_runtime_fails_quietly() {
        let (connector, _peers) = MockConnector::new([MockOutcome::Accept]);
        let manager = ConnectionManager::new(Arc::new(connector), SubscriptionRegistry::new());

        manager.connect("ws://mock", options(1, 10));
        assert_eq!(manager.state(), ConnectionState::Failed);
        assert!(!manager.is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_declared_channels_include_registry_channels() {
        let (connector, mut peers) = MockConnector::new([MockOutcome::Accept]);
        let registry = SubscriptionRegistry::new();
        registry.subscribe("gas_prices", crate::ws::registry::callback(|_| {}));
        let manager = ConnectionManager::new(Arc::new(connector), registry);

        manager.connect("ws://mock", options(0, 10));
        let mut peer = peers.next().await.unwrap();
        let sent: serde_json::Value =
            serde_json::from_str(&peer.next_sent().await.unwrap()).unwrap();

        let channels: Vec<&str> = sent["channels"]
            .as_array()
            .unwrap()
            .iter()
            .map(|value| value.as_str().unwrap())
            .collect();
        assert_eq!(
            channels,
            vec![
                "anomaly_alerts",
                "cross_chain_correlations",
                "gas_prices",
                "market_predictions",
                "network_metrics",
                "whale_transactions",
            ]
        );

        manager.disconnect().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_requires_live_session() {
        let (connector, _peers) = MockConnector::new([]);
        let manager = ConnectionManager::new(Arc::new(connector), SubscriptionRegistry::new());
        assert!(matches!(
            manager.send(OutboundMessage::Ping),
            Err(StreamError::NotConnected)
        ));
    }
}
