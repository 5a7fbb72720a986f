/*
[INPUT]:  Crate modules and public type definitions
[OUTPUT]: Public CryptoWire stream client crate surface
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod client;
pub mod config;
pub mod error;
pub mod provider;
pub mod request;
pub mod types;
pub mod ws;

pub use client::CryptoWireClient;
pub use config::{ClientConfig, ConnectOptions, ProviderConfig};
pub use error::{Result, StreamError};

// Re-export commonly used types from provider
pub use provider::{LatencyProfile, RemoteProvider, SnapshotProvider, SyntheticProvider};

pub use request::{RequestToken, RequestTracker};

// Re-export all types
pub use types::*;

// Re-export commonly used types from ws
pub use ws::{
    Callback,
    Channel,
    ConnectionEvent,
    ConnectionManager,
    ConnectionState,
    Connector,
    DispatchReport,
    InboundMessage,
    MockConnector,
    MockOutcome,
    MockPeer,
    MockPeers,
    OutboundMessage,
    SubscriptionRegistry,
    TungsteniteConnector,
    callback,
};
