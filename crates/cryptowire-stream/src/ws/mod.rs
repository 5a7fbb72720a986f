/*
[INPUT]:  Endpoint configuration, channel subscriptions, inbound frames
[OUTPUT]: Supervised streaming session with per-channel fan-out
[POS]:    WebSocket layer - real-time push streams
[UPDATE]: When adding new channels or changing connection logic
*/

pub mod connection;
pub mod message;
pub mod registry;
pub mod timer;
pub mod transport;

pub use connection::{ConnectionEvent, ConnectionManager, ConnectionState};
pub use message::{Channel, InboundMessage, OutboundMessage, decode_frame};
pub use registry::{Callback, DispatchReport, SubscriptionRegistry, callback};
pub use timer::TimerTracker;
pub use transport::{
    Connector, MockAttempt, MockConnector, MockOutcome, MockPeer, MockPeers, Transport,
    TungsteniteConnector,
};
