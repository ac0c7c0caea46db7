pub mod actions;
pub mod api;
pub mod chain;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod retry;
pub mod runner;
pub mod scoring;
pub mod validation;

pub use actions::{
    ActionDefinition, AddLiquidityAction, BridgeRebalanceAction, CooldownGate,
    RemoveLiquidityAction, SwapAction, VaultSyncAction,
};
pub use chain::{
    BridgeClient, BridgeQuote, BridgeTransferStatus, ChainClient, GatewayChainClient,
    HttpBridgeClient, SimBridgeClient, SimChainClient,
};
pub use config::AppConfig;
pub use domain::{BridgePhase, ResourceLock, StartOutcome, Task, TaskData, TaskStatus};
pub use error::{LaminarError, Result};
pub use persistence::{MemoryTaskStore, SqliteTaskStore, TaskStore};
pub use retry::{with_retry, RetryPolicy};
pub use runner::{ActionRunner, Scheduler, TickSummary};
pub use scoring::{ChainScore, OpportunitySnapshot, ScoreFeed, ScoreFeedHandle};
