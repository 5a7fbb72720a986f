/*
[INPUT]:  Snapshot schema definitions and serde requirements
[OUTPUT]: Typed Rust structs/enums with serialization support
[POS]:    Data layer - records produced by the request facade and pushed channels
[UPDATE]: When the snapshot schema changes or new record types are added
*/

pub mod enums;
pub mod models;

pub use enums::*;
pub use models::*;

/// Chains the client declares interest in by default
pub const SUPPORTED_CHAINS: [&str; 9] = [
    "bitcoin",
    "ethereum",
    "solana",
    "polygon",
    "kava",
    "arbitrum",
    "optimism",
    "avalanche",
    "binance-smart-chain",
];
