//! Liquidity Opportunity Score feed
//!
//! Maintains a per-chain composite score (pool yield and realized volatility
//! weighted positively, gas cost negatively) and publishes timestamped
//! snapshots that action predicates can read without blocking.

pub mod feed;

pub use feed::{ChainScore, OpportunitySnapshot, ScoreFeed, ScoreFeedHandle};
