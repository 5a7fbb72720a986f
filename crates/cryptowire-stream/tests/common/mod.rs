/*
[INPUT]:  Test configuration and mock server requirements
[OUTPUT]: Shared test utilities, fixtures, and mock helpers
[POS]:    Test infrastructure - shared across all test modules
[UPDATE]: When adding new test patterns or fixtures
*/

//! Common test utilities for cryptowire-stream tests

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cryptowire_stream::{
    Callback, ConnectOptions, ConnectionEvent, ConnectionManager, ConnectionState, MockPeer,
    callback,
};
use tokio::sync::broadcast;
use wiremock::MockServer;

/// Setup a mock HTTP server for testing
pub async fn setup_mock_server() -> MockServer {
    MockServer::start().await
}

/// Options with a heartbeat long enough to stay out of the way
pub fn quiet_options(attempts: u32, interval_ms: u64) -> ConnectOptions {
    ConnectOptions {
        reconnect_attempts: attempts,
        reconnect_interval: Duration::from_millis(interval_ms),
        heartbeat_interval: Duration::from_secs(3600),
        pong_timeout: None,
        ..ConnectOptions::default()
    }
}

/// Next lifecycle event, skipping heartbeats
pub async fn next_event(events: &mut broadcast::Receiver<ConnectionEvent>) -> ConnectionEvent {
    loop {
        match events.recv().await {
            Ok(ConnectionEvent::HeartbeatSent) => continue,
            Ok(event) => return event,
            Err(err) => panic!("event stream ended: {err}"),
        }
    }
}

/// Next control message the client sent, skipping pings
pub async fn next_control(peer: &mut MockPeer) -> serde_json::Value {
    loop {
        let text = peer.next_sent().await.expect("client side closed");
        let value: serde_json::Value = serde_json::from_str(&text).expect("control json");
        if value["type"] != "ping" {
            return value;
        }
    }
}

/// Never `Connected` while the transport is closed
pub fn assert_consistent(manager: &ConnectionManager) {
    if manager.state() == ConnectionState::Connected {
        assert!(manager.transport_open(), "connected without open transport");
    }
    if manager.is_active() {
        assert_eq!(manager.state(), ConnectionState::Connected);
    }
}

/// Callback that records every payload it receives
pub fn recorder() -> (Callback, Arc<Mutex<Vec<serde_json::Value>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let cb = callback(move |payload| sink.lock().unwrap().push(payload.clone()));
    (cb, seen)
}

/// Yield until the worker has drained everything it can without time advancing
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
