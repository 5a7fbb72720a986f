/*
[INPUT]:  Scripted mock transports and paused Tokio time
[OUTPUT]: Test results for connection lifecycle, reconnect backoff and dispatch
[POS]:    Integration tests - connection manager
[UPDATE]: When reconnect policy, heartbeat, or teardown semantics change
*/

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{assert_consistent, next_control, next_event, quiet_options, recorder, settle};
use cryptowire_stream::{
    ConnectionEvent, ConnectionManager, ConnectionState, MockConnector, MockOutcome, MockPeers,
    SubscriptionRegistry, callback,
};
use tokio::time::Instant;

const ENDPOINT: &str = "ws://mock.local/stream";

fn manager_with(script: Vec<MockOutcome>) -> (ConnectionManager, MockConnector, MockPeers) {
    let (connector, peers) = MockConnector::new(script);
    let manager =
        ConnectionManager::new(Arc::new(connector.clone()), SubscriptionRegistry::new());
    (manager, connector, peers)
}

#[tokio::test(start_paused = true)]
async fn test_connect_reports_connecting_immediately() {
    let (manager, _connector, _peers) = manager_with(vec![MockOutcome::Accept]);

    manager.connect(ENDPOINT, quiet_options(3, 100));
    assert_eq!(manager.state(), ConnectionState::Connecting);
    assert!(!manager.is_active());

    manager.disconnect().await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_connected_session_declares_channels_and_chains() {
    let (manager, connector, mut peers) = manager_with(vec![MockOutcome::Accept]);
    let mut events = manager.events();

    let mut options = quiet_options(3, 100);
    options.chains = vec!["bitcoin".to_string(), "solana".to_string()];
    options.api_key = Some("secret".to_string());
    manager.connect(ENDPOINT, options);

    assert_eq!(
        next_event(&mut events).await,
        ConnectionEvent::Connected {
            endpoint: ENDPOINT.to_string()
        }
    );
    assert!(manager.is_active());
    assert_consistent(&manager);

    let mut peer = peers.next().await.unwrap();
    let subscribe = next_control(&mut peer).await;
    assert_eq!(subscribe["type"], "subscribe");
    assert_eq!(subscribe["chains"], serde_json::json!(["bitcoin", "solana"]));
    assert_eq!(subscribe["channels"].as_array().unwrap().len(), 5);

    let attempts = connector.attempts();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].endpoint, ENDPOINT);
    assert_eq!(attempts[0].api_key.as_deref(), Some("secret"));

    manager.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_second_connect_while_running_is_ignored() {
    let (manager, connector, _peers) = manager_with(vec![MockOutcome::Accept]);
    let mut events = manager.events();

    manager.connect(ENDPOINT, quiet_options(3, 100));
    manager.connect(ENDPOINT, quiet_options(3, 100));
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connected { .. }
    ));
    settle().await;

    assert_eq!(connector.attempts().len(), 1);
    manager.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_close_schedules_linear_backoff_and_resets_after_success() {
    let (manager, _connector, mut peers) = manager_with(vec![
        MockOutcome::Accept,
        MockOutcome::Refuse("refused".to_string()),
        MockOutcome::Accept,
    ]);
    let mut events = manager.events();
    manager.connect(ENDPOINT, quiet_options(5, 100));

    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connected { .. }
    ));
    let mut first = peers.next().await.unwrap();
    first.close();

    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Closed { .. }
    ));
    assert_eq!(
        next_event(&mut events).await,
        ConnectionEvent::ReconnectScheduled {
            attempt: 1,
            delay: Duration::from_millis(100)
        }
    );
    assert_eq!(manager.state(), ConnectionState::Reconnecting);
    assert!(!manager.transport_open());
    assert_consistent(&manager);

    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::ConnectFailed { attempt: 1, .. }
    ));
    assert_eq!(
        next_event(&mut events).await,
        ConnectionEvent::ReconnectScheduled {
            attempt: 2,
            delay: Duration::from_millis(200)
        }
    );

    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connected { .. }
    ));
    assert_consistent(&manager);

    let mut second = peers.next().await.unwrap();
    second.close();
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Closed { .. }
    ));
    assert_eq!(
        next_event(&mut events).await,
        ConnectionEvent::ReconnectScheduled {
            attempt: 1,
            delay: Duration::from_millis(100)
        }
    );

    manager.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_reconnects_end_in_failed() {
    let (manager, connector, _peers) = manager_with(Vec::new());
    let mut events = manager.events();
    let started = Instant::now();

    manager.connect(ENDPOINT, quiet_options(2, 100));

    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::ConnectFailed { attempt: 0, .. }
    ));
    assert_eq!(
        next_event(&mut events).await,
        ConnectionEvent::ReconnectScheduled {
            attempt: 1,
            delay: Duration::from_millis(100)
        }
    );
    assert_eq!(manager.pending_timers(), 1);

    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::ConnectFailed { attempt: 1, .. }
    ));
    assert_eq!(started.elapsed(), Duration::from_millis(100));
    assert_eq!(
        next_event(&mut events).await,
        ConnectionEvent::ReconnectScheduled {
            attempt: 2,
            delay: Duration::from_millis(200)
        }
    );

    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::ConnectFailed { attempt: 2, .. }
    ));
    assert_eq!(started.elapsed(), Duration::from_millis(300));
    assert_eq!(
        next_event(&mut events).await,
        ConnectionEvent::ReconnectExhausted { attempts: 2 }
    );

    assert_eq!(manager.state(), ConnectionState::Failed);
    assert!(!manager.is_active());
    assert_eq!(manager.pending_timers(), 0);
    assert_eq!(connector.attempts().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_reconnecting_cancels_backoff() {
    let (manager, connector, _peers) = manager_with(Vec::new());
    let mut events = manager.events();
    let (cb, _seen) = recorder();
    manager.registry().subscribe("whale_transactions", cb);

    manager.connect(ENDPOINT, quiet_options(5, 1_000));
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::ConnectFailed { .. }
    ));
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::ReconnectScheduled { .. }
    ));
    assert_eq!(manager.pending_timers(), 1);

    manager.disconnect().await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(manager.pending_timers(), 0);
    assert!(manager.registry().is_empty());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(connector.attempts().len(), 1);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_while_connected_closes_transport() {
    let (manager, _connector, mut peers) = manager_with(vec![MockOutcome::Accept]);
    let mut events = manager.events();
    let (cb, _seen) = recorder();
    manager.registry().subscribe("anomaly_alerts", cb);

    manager.connect(ENDPOINT, quiet_options(5, 100));
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connected { .. }
    ));
    let mut peer = peers.next().await.unwrap();
    assert_eq!(manager.pending_timers(), 1);

    manager.disconnect().await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(!manager.is_active());
    assert!(!manager.transport_open());
    assert_eq!(manager.pending_timers(), 0);
    assert!(manager.registry().is_empty());

    let _subscribe = next_control(&mut peer).await;
    assert!(peer.next_sent().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_when_idle_is_harmless() {
    let (manager, _connector, _peers) = manager_with(Vec::new());
    manager.disconnect().await;
    manager.disconnect().await;
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(manager.pending_timers(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_heartbeat_ping_after_interval() {
    let (manager, _connector, mut peers) = manager_with(vec![MockOutcome::Accept]);
    let mut events = manager.events();
    let mut options = quiet_options(1, 100);
    options.heartbeat_interval = Duration::from_millis(1_000);

    manager.connect(ENDPOINT, options);
    let mut peer = peers.next().await.unwrap();
    let started = Instant::now();

    let subscribe: serde_json::Value =
        serde_json::from_str(&peer.next_sent().await.unwrap()).unwrap();
    assert_eq!(subscribe["type"], "subscribe");

    let ping: serde_json::Value = serde_json::from_str(&peer.next_sent().await.unwrap()).unwrap();
    assert_eq!(ping, serde_json::json!({ "type": "ping" }));
    assert_eq!(started.elapsed(), Duration::from_millis(1_000));

    assert!(matches!(
        events.recv().await.unwrap(),
        ConnectionEvent::Connected { .. }
    ));
    assert_eq!(events.recv().await.unwrap(), ConnectionEvent::HeartbeatSent);

    manager.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_pong_timeout_closes_silent_session() {
    let (manager, _connector, mut peers) = manager_with(vec![MockOutcome::Accept]);
    let mut events = manager.events();
    let mut options = quiet_options(0, 100);
    options.pong_timeout = Some(Duration::from_secs(5));

    manager.connect(ENDPOINT, options);
    let _peer = peers.next().await.unwrap();
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connected { .. }
    ));

    let started = Instant::now();
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Closed { .. }
    ));
    assert_eq!(started.elapsed(), Duration::from_secs(5));
    assert_eq!(
        next_event(&mut events).await,
        ConnectionEvent::ReconnectExhausted { attempts: 0 }
    );
    assert_eq!(manager.state(), ConnectionState::Failed);
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_reaches_subscribers_in_order() {
    let (manager, _connector, mut peers) = manager_with(vec![MockOutcome::Accept]);
    let order = Arc::new(Mutex::new(Vec::new()));
    for name in ["A", "B"] {
        let order = order.clone();
        manager.registry().subscribe(
            "anomaly_alerts",
            callback(move |payload| {
                order
                    .lock()
                    .unwrap()
                    .push((name, payload["id"].as_str().unwrap_or_default().to_string()));
            }),
        );
    }

    manager.connect(ENDPOINT, quiet_options(3, 100));
    let mut peer = peers.next().await.unwrap();
    let _subscribe = next_control(&mut peer).await;

    assert!(peer.push(r#"{"type":"anomaly_alerts","payload":{"id":"alert-1"}}"#));
    assert!(peer.push(r#"{"type":"whale_transactions","payload":{"id":"ignored"}}"#));
    settle().await;

    assert_eq!(
        *order.lock().unwrap(),
        vec![
            ("A", "alert-1".to_string()),
            ("B", "alert-1".to_string())
        ]
    );

    manager.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_decode_failure_does_not_break_stream() {
    let (manager, _connector, mut peers) = manager_with(vec![MockOutcome::Accept]);
    let mut events = manager.events();
    let (cb, seen) = recorder();
    manager.registry().subscribe("network_metrics", cb);

    manager.connect(ENDPOINT, quiet_options(3, 100));
    let mut peer = peers.next().await.unwrap();
    let _subscribe = next_control(&mut peer).await;
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::Connected { .. }
    ));

    assert!(peer.push("{not json"));
    assert!(matches!(
        next_event(&mut events).await,
        ConnectionEvent::DecodeFailed { .. }
    ));

    assert!(peer.push(r#"{"type":"pong"}"#));
    assert!(peer.push(r#"{"type":"network_metrics","payload":{"chain":"ethereum"}}"#));
    settle().await;

    assert_eq!(
        *seen.lock().unwrap(),
        vec![serde_json::json!({ "chain": "ethereum" })]
    );
    assert!(manager.is_active());

    manager.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_resubscribes_without_duplicating_callbacks() {
    let (manager, _connector, mut peers) =
        manager_with(vec![MockOutcome::Accept, MockOutcome::Accept]);
    let (cb, seen) = recorder();
    manager.registry().subscribe("gas_prices", cb);

    manager.connect(ENDPOINT, quiet_options(3, 100));
    let mut first = peers.next().await.unwrap();
    let _subscribe = next_control(&mut first).await;
    first.close();

    let mut second = peers.next().await.unwrap();
    let resubscribe = next_control(&mut second).await;
    assert!(
        resubscribe["channels"]
            .as_array()
            .unwrap()
            .contains(&serde_json::json!("gas_prices"))
    );

    assert!(manager.is_active());
    assert_eq!(manager.registry().subscriber_count("gas_prices"), 1);

    assert!(second.push(r#"{"type":"gas_prices","payload":{"gwei":31}}"#));
    settle().await;
    assert_eq!(seen.lock().unwrap().len(), 1);

    manager.disconnect().await;
}

#[tokio::test(start_paused = true)]
async fn test_request_channel_while_connected() {
    let (manager, _connector, mut peers) = manager_with(vec![MockOutcome::Accept]);
    let mut options = quiet_options(3, 100);
    options.chains = vec!["ethereum".to_string()];

    manager.connect(ENDPOINT, options);
    let mut peer = peers.next().await.unwrap();
    let _subscribe = next_control(&mut peer).await;

    manager.request_channel("gas_prices").unwrap();
    let declared = next_control(&mut peer).await;
    assert_eq!(
        declared,
        serde_json::json!({
            "type": "subscribe",
            "channels": ["gas_prices"],
            "chains": ["ethereum"],
        })
    );

    manager.disconnect().await;
    assert!(manager.request_channel("gas_prices").is_err());
}
