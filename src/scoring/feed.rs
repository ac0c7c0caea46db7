use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::chain::ChainClient;
use crate::config::ScoringConfig;
use crate::error::Result;
use crate::retry::{with_retry, RetryPolicy};

/// Composite opportunity score for one chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainScore {
    pub chain_id: u64,
    /// Historic yield of the reference fee-free pool
    pub pool_yield: Decimal,
    /// Historic price volatility of the reference pair
    pub volatility: Decimal,
    /// Current gas cost, normalized to the quote asset
    pub gas_cost: Decimal,
    pub score: Decimal,
}

/// Consistent, timestamped per-chain score snapshot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OpportunitySnapshot {
    pub scores: HashMap<u64, ChainScore>,
    pub computed_at: Option<DateTime<Utc>>,
}

impl OpportunitySnapshot {
    pub fn score(&self, chain_id: u64) -> Option<Decimal> {
        self.scores.get(&chain_id).map(|s| s.score)
    }

    pub fn best_chain(&self) -> Option<&ChainScore> {
        self.scores.values().max_by_key(|s| s.score)
    }

    pub fn worst_chain(&self) -> Option<&ChainScore> {
        self.scores.values().min_by_key(|s| s.score)
    }

    /// Source (worst) and destination (best) for a rebalance, but only when
    /// the score spread clears `min_delta` — marginal wiggles never move
    /// funds.
    pub fn rebalance_route(&self, min_delta: Decimal) -> Option<(&ChainScore, &ChainScore)> {
        let best = self.best_chain()?;
        let worst = self.worst_chain()?;
        if best.chain_id == worst.chain_id || best.score - worst.score < min_delta {
            return None;
        }
        Some((worst, best))
    }

    pub fn is_stale(&self, max_age: Duration) -> bool {
        match self.computed_at {
            None => true,
            Some(at) => {
                let age = Utc::now().signed_duration_since(at);
                age.num_milliseconds() > max_age.as_millis() as i64
            }
        }
    }
}

/// Read handle onto the latest snapshot; `snapshot()` never blocks
#[derive(Clone)]
pub struct ScoreFeedHandle {
    rx: watch::Receiver<OpportunitySnapshot>,
}

impl ScoreFeedHandle {
    pub fn snapshot(&self) -> OpportunitySnapshot {
        self.rx.borrow().clone()
    }

    /// Handle over a fixed snapshot, for tests and dry-run wiring
    pub fn fixed(snapshot: OpportunitySnapshot) -> Self {
        let (_tx, rx) = watch::channel(snapshot);
        Self { rx }
    }
}

/// Sampling task that recomputes chain scores on an interval and publishes
/// them through a watch channel
pub struct ScoreFeed {
    config: ScoringConfig,
    chains: Vec<Arc<dyn ChainClient>>,
    tx: watch::Sender<OpportunitySnapshot>,
    rx: watch::Receiver<OpportunitySnapshot>,
}

impl ScoreFeed {
    pub fn new(config: ScoringConfig, chains: Vec<Arc<dyn ChainClient>>) -> Self {
        let (tx, rx) = watch::channel(OpportunitySnapshot::default());
        Self {
            config,
            chains,
            tx,
            rx,
        }
    }

    pub fn handle(&self) -> ScoreFeedHandle {
        ScoreFeedHandle {
            rx: self.rx.clone(),
        }
    }

    /// Sample every chain once and publish the combined snapshot. Chains
    /// whose reads fail keep their previous score rather than poisoning the
    /// snapshot.
    pub async fn refresh(&self) -> Result<()> {
        let previous = self.rx.borrow().clone();
        let mut scores = HashMap::new();

        for chain in &self.chains {
            match self.sample_chain(chain.as_ref()).await {
                Ok(score) => {
                    debug!(
                        "Chain {} scored {} (yield={}, volatility={}, gas={})",
                        score.chain_id, score.score, score.pool_yield, score.volatility,
                        score.gas_cost
                    );
                    scores.insert(score.chain_id, score);
                }
                Err(e) => {
                    warn!("Score sample failed for chain {}: {}", chain.chain_id(), e);
                    if let Some(old) = previous.scores.get(&chain.chain_id()) {
                        scores.insert(old.chain_id, old.clone());
                    }
                }
            }
        }

        let snapshot = OpportunitySnapshot {
            scores,
            computed_at: Some(Utc::now()),
        };
        // Receivers outlive the feed; send only fails with zero receivers
        let _ = self.tx.send(snapshot);
        Ok(())
    }

    async fn sample_chain(&self, chain: &dyn ChainClient) -> Result<ChainScore> {
        let policy = RetryPolicy::read();
        let pair = self.config.reference_pair.as_str();

        let pool_yield = with_retry("pool_yield", &policy, || chain.pool_yield(pair)).await?;
        let volatility =
            with_retry("price_volatility", &policy, || chain.price_volatility(pair)).await?;
        let gas_cost = with_retry("gas_price", &policy, || chain.gas_price()).await?;

        Ok(self.config.score(chain.chain_id(), pool_yield, volatility, gas_cost))
    }

    /// Own the sampling loop until shutdown is signalled
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker =
            tokio::time::interval(Duration::from_millis(self.config.refresh_interval_ms));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await {
                        warn!("Score refresh failed: {}", e);
                    }
                }
                _ = shutdown.changed() => {
                    debug!("Score feed stopping");
                    break;
                }
            }
        }
    }
}

impl ScoringConfig {
    /// LOS composition: yield and volatility carry positive weight, gas cost
    /// negative weight
    pub fn score(
        &self,
        chain_id: u64,
        pool_yield: Decimal,
        volatility: Decimal,
        gas_cost: Decimal,
    ) -> ChainScore {
        let score = self.yield_weight * pool_yield + self.volatility_weight * volatility
            - self.gas_weight * gas_cost;
        ChainScore {
            chain_id,
            pool_yield,
            volatility,
            gas_cost,
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn config() -> ScoringConfig {
        ScoringConfig {
            reference_pair: "weth-usdc".to_string(),
            yield_weight: Decimal::ONE,
            volatility_weight: Decimal::from_str("0.5").unwrap(),
            gas_weight: Decimal::from_str("2").unwrap(),
            min_score: Decimal::from_str("0.1").unwrap(),
            min_score_delta: Decimal::from_str("0.5").unwrap(),
            refresh_interval_ms: 15_000,
            stale_after_ms: 60_000,
        }
    }

    fn snapshot_of(scores: &[(u64, &str)]) -> OpportunitySnapshot {
        let cfg = config();
        OpportunitySnapshot {
            scores: scores
                .iter()
                .map(|(id, y)| {
                    let score = cfg.score(
                        *id,
                        Decimal::from_str(y).unwrap(),
                        Decimal::ZERO,
                        Decimal::ZERO,
                    );
                    (*id, score)
                })
                .collect(),
            computed_at: Some(Utc::now()),
        }
    }

    #[test]
    fn gas_cost_lowers_the_score() {
        let cfg = config();
        let cheap = cfg.score(1, Decimal::ONE, Decimal::ONE, Decimal::ZERO);
        let pricey = cfg.score(1, Decimal::ONE, Decimal::ONE, Decimal::ONE);
        assert!(pricey.score < cheap.score);
    }

    #[test]
    fn yield_and_volatility_raise_the_score() {
        let cfg = config();
        let base = cfg.score(1, Decimal::ONE, Decimal::ONE, Decimal::ZERO);
        let better_yield = cfg.score(1, Decimal::TWO, Decimal::ONE, Decimal::ZERO);
        let more_volatile = cfg.score(1, Decimal::ONE, Decimal::TWO, Decimal::ZERO);
        assert!(better_yield.score > base.score);
        assert!(more_volatile.score > base.score);
    }

    #[test]
    fn rebalance_route_requires_the_configured_spread() {
        let wide = snapshot_of(&[(1, "0.1"), (8453, "2.0")]);
        let (source, dest) = wide
            .rebalance_route(Decimal::from_str("0.5").unwrap())
            .expect("spread of 1.9 should route");
        assert_eq!(source.chain_id, 1);
        assert_eq!(dest.chain_id, 8453);

        let narrow = snapshot_of(&[(1, "1.0"), (8453, "1.2")]);
        assert!(narrow
            .rebalance_route(Decimal::from_str("0.5").unwrap())
            .is_none());
    }

    #[test]
    fn empty_snapshot_is_stale() {
        let empty = OpportunitySnapshot::default();
        assert!(empty.is_stale(Duration::from_secs(60)));

        let fresh = snapshot_of(&[(1, "1.0")]);
        assert!(!fresh.is_stale(Duration::from_secs(60)));
    }
}
