//! Action definitions — the schedulable units of work
//!
//! Each definition declares the resource locks it needs, a non-blocking
//! eligibility predicate over the score feed, and the start/update lifecycle
//! the runner drives once per tick.

pub mod bridge;
pub mod liquidity;
pub mod swap;
pub mod traits;
pub mod vault_sync;

pub use bridge::BridgeRebalanceAction;
pub use liquidity::{AddLiquidityAction, RemoveLiquidityAction};
pub use swap::SwapAction;
pub use traits::{ActionDefinition, CooldownGate};
pub use vault_sync::VaultSyncAction;
