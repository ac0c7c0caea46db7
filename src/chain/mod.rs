//! Chain and bridge boundaries
//!
//! Every on-chain read and write goes through the `ChainClient` trait; value
//! transfer between chains goes through `BridgeClient`. Both are opaque
//! asynchronous collaborators: the live implementations talk JSON over HTTP
//! to the per-chain gateway and the bridge composition service, the sim
//! implementations back dry-run sessions and tests.

pub mod bridge;
pub mod client;
pub mod sim;

pub use bridge::{BridgeClient, BridgeQuote, BridgeTransferStatus, HttpBridgeClient};
pub use client::{ChainClient, GatewayChainClient};
pub use sim::{SimBridgeClient, SimChainClient};

#[cfg(test)]
pub use bridge::MockBridgeClient;
#[cfg(test)]
pub use client::MockChainClient;
