use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

use crate::chain::ChainClient;
use crate::config::{LiquidityConfig, ScoringConfig};
use crate::domain::{ResourceLock, StartOutcome, Task, TaskData, TaskStatus};
use crate::error::{LaminarError, Result};
use crate::retry::{with_retry, RetryPolicy};
use crate::scoring::ScoreFeedHandle;

use super::{ActionDefinition, CooldownGate};

/// Deploy a tranche of vault funds into a chain's pool while the chain's
/// score clears the floor. Holds both the pool and the vault lock.
pub struct AddLiquidityAction {
    name: String,
    chain: Arc<dyn ChainClient>,
    feed: ScoreFeedHandle,
    config: LiquidityConfig,
    pair: String,
    quote_asset: String,
    min_score: Decimal,
    stale_after: Duration,
    cooldown: CooldownGate,
}

impl AddLiquidityAction {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        feed: ScoreFeedHandle,
        pair: &str,
        quote_asset: &str,
        config: LiquidityConfig,
        scoring: &ScoringConfig,
    ) -> Self {
        Self {
            name: format!("add-liquidity-{}", chain.name()),
            chain,
            feed,
            cooldown: CooldownGate::new(config.cooldown_secs),
            config,
            pair: pair.to_string(),
            quote_asset: quote_asset.to_string(),
            min_score: scoring.min_score,
            stale_after: Duration::from_millis(scoring.stale_after_ms),
        }
    }

    fn chain_attractive(&self) -> bool {
        let snapshot = self.feed.snapshot();
        if snapshot.is_stale(self.stale_after) {
            return false;
        }
        snapshot
            .score(self.chain.chain_id())
            .map_or(false, |score| score >= self.min_score)
    }
}

#[async_trait]
impl ActionDefinition for AddLiquidityAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn lock_resources(&self) -> Vec<ResourceLock> {
        vec![
            ResourceLock::pool(self.chain.chain_id(), &self.pair),
            ResourceLock::vault(self.chain.chain_id()),
        ]
    }

    fn should_start(&self, _active_tasks: &[Task]) -> bool {
        self.cooldown.ready() && self.chain_attractive()
    }

    async fn start(&self, _active_tasks: &[Task], force: bool) -> Result<StartOutcome> {
        if !force && !self.chain_attractive() {
            return Ok(StartOutcome::declined("chain no longer attractive"));
        }

        let balance = with_retry("vault_balance", &RetryPolicy::read(), || {
            self.chain.vault_balance(&self.quote_asset)
        })
        .await?;

        if balance - self.config.tranche < self.config.min_vault_reserve {
            return Ok(StartOutcome::declined(format!(
                "deposit of {} would leave vault below reserve {} (balance {})",
                self.config.tranche, self.config.min_vault_reserve, balance
            )));
        }

        let task = Task::new(
            &self.name,
            self.lock_resources(),
            TaskData::AddLiquidity {
                chain_id: self.chain.chain_id(),
                pair: self.pair.clone(),
                amount: self.config.tranche,
            },
        );
        Ok(StartOutcome::Started(task))
    }

    async fn update(&self, mut task: Task) -> Result<Task> {
        match task.status {
            TaskStatus::PreStart => {
                task.mark_running("depositing liquidity");
                Ok(task)
            }
            TaskStatus::Running => {
                let TaskData::AddLiquidity { pair, amount, .. } = task.task_data.clone() else {
                    return Err(LaminarError::Internal(format!(
                        "task {} carries a non-deposit payload",
                        task.id
                    )));
                };

                let tx_hash = with_retry("deposit_liquidity", &RetryPolicy::write(), || {
                    self.chain.deposit_liquidity(&pair, amount)
                })
                .await?;

                task.complete(format!("deposited {} into {}: {}", amount, pair, tx_hash));
                self.cooldown.arm();
                Ok(task)
            }
            _ => Ok(task),
        }
    }
}

/// Pull deployed liquidity back into the vault once the chain's score falls
/// below the floor. Same lock set as the deposit action, so the two can
/// never run concurrently on one chain.
pub struct RemoveLiquidityAction {
    name: String,
    chain: Arc<dyn ChainClient>,
    feed: ScoreFeedHandle,
    config: LiquidityConfig,
    pair: String,
    min_score: Decimal,
    stale_after: Duration,
    cooldown: CooldownGate,
}

impl RemoveLiquidityAction {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        feed: ScoreFeedHandle,
        pair: &str,
        config: LiquidityConfig,
        scoring: &ScoringConfig,
    ) -> Self {
        Self {
            name: format!("remove-liquidity-{}", chain.name()),
            chain,
            feed,
            cooldown: CooldownGate::new(config.cooldown_secs),
            config,
            pair: pair.to_string(),
            min_score: scoring.min_score,
            stale_after: Duration::from_millis(scoring.stale_after_ms),
        }
    }

    fn chain_underperforming(&self) -> bool {
        let snapshot = self.feed.snapshot();
        if snapshot.is_stale(self.stale_after) {
            return false;
        }
        snapshot
            .score(self.chain.chain_id())
            .map_or(false, |score| score < self.min_score)
    }
}

#[async_trait]
impl ActionDefinition for RemoveLiquidityAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn lock_resources(&self) -> Vec<ResourceLock> {
        vec![
            ResourceLock::pool(self.chain.chain_id(), &self.pair),
            ResourceLock::vault(self.chain.chain_id()),
        ]
    }

    fn should_start(&self, _active_tasks: &[Task]) -> bool {
        self.cooldown.ready() && self.chain_underperforming()
    }

    async fn start(&self, _active_tasks: &[Task], force: bool) -> Result<StartOutcome> {
        if !force && !self.chain_underperforming() {
            return Ok(StartOutcome::declined("chain score recovered"));
        }

        let deployed = with_retry("pool_position", &RetryPolicy::read(), || {
            self.chain.pool_position(&self.pair)
        })
        .await?;

        if deployed <= Decimal::ZERO {
            return Ok(StartOutcome::declined("nothing deployed in the pool"));
        }

        let task = Task::new(
            &self.name,
            self.lock_resources(),
            TaskData::RemoveLiquidity {
                chain_id: self.chain.chain_id(),
                pair: self.pair.clone(),
                amount: self.config.tranche.min(deployed),
            },
        );
        Ok(StartOutcome::Started(task))
    }

    async fn update(&self, mut task: Task) -> Result<Task> {
        match task.status {
            TaskStatus::PreStart => {
                task.mark_running("withdrawing liquidity");
                Ok(task)
            }
            TaskStatus::Running => {
                let TaskData::RemoveLiquidity { pair, amount, .. } = task.task_data.clone() else {
                    return Err(LaminarError::Internal(format!(
                        "task {} carries a non-withdraw payload",
                        task.id
                    )));
                };

                let tx_hash = with_retry("withdraw_liquidity", &RetryPolicy::write(), || {
                    self.chain.withdraw_liquidity(&pair, amount)
                })
                .await?;

                task.complete(format!("withdrew {} from {}: {}", amount, pair, tx_hash));
                self.cooldown.arm();
                Ok(task)
            }
            _ => Ok(task),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainClient;
    use crate::config::AppConfig;
    use crate::scoring::OpportunitySnapshot;
    use chrono::Utc;

    fn scoring() -> ScoringConfig {
        AppConfig::default_dry_run().scoring
    }

    fn feed_with_score(chain_id: u64, pool_yield: Decimal) -> ScoreFeedHandle {
        let cfg = scoring();
        let score = cfg.score(chain_id, pool_yield, Decimal::ZERO, Decimal::ZERO);
        ScoreFeedHandle::fixed(OpportunitySnapshot {
            scores: [(chain_id, score)].into_iter().collect(),
            computed_at: Some(Utc::now()),
        })
    }

    fn mock_chain() -> MockChainClient {
        let mut chain = MockChainClient::new();
        chain.expect_chain_id().return_const(10u64);
        chain.expect_name().return_const("optimism".to_string());
        chain
    }

    #[tokio::test]
    async fn deposit_declines_when_reserve_would_be_broken() {
        let mut chain = mock_chain();
        chain
            .expect_vault_balance()
            .returning(|_| Ok(Decimal::new(1_200, 0)));

        let action = AddLiquidityAction::new(
            Arc::new(chain),
            feed_with_score(10, Decimal::TEN),
            "weth-usdc",
            "usdc",
            LiquidityConfig::default(),
            &scoring(),
        );

        // 1200 - 1000 tranche < 500 reserve
        match action.start(&[], false).await.unwrap() {
            StartOutcome::NotStarted { reason } => {
                assert!(reason.contains("below reserve"), "got: {}", reason)
            }
            other => panic!("expected decline, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn deposit_completes_over_two_updates() {
        let mut chain = mock_chain();
        chain
            .expect_vault_balance()
            .returning(|_| Ok(Decimal::new(5_000, 0)));
        chain
            .expect_deposit_liquidity()
            .times(1)
            .returning(|_, _| Ok("0xdep".to_string()));

        let action = AddLiquidityAction::new(
            Arc::new(chain),
            feed_with_score(10, Decimal::TEN),
            "weth-usdc",
            "usdc",
            LiquidityConfig::default(),
            &scoring(),
        );
        assert!(action.should_start(&[]));

        let task = match action.start(&[], false).await.unwrap() {
            StartOutcome::Started(task) => task,
            other => panic!("expected a task, got {:?}", other),
        };
        assert_eq!(task.resources_taken.len(), 2);

        let task = action.update(task).await.unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        let task = action.update(task).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.status_message.contains("0xdep"));
    }

    #[tokio::test]
    async fn withdraw_only_triggers_below_floor() {
        let chain = mock_chain();
        let action = RemoveLiquidityAction::new(
            Arc::new(chain),
            feed_with_score(10, Decimal::TEN),
            "weth-usdc",
            LiquidityConfig::default(),
            &scoring(),
        );
        assert!(!action.should_start(&[]));

        let chain = mock_chain();
        let underperforming = RemoveLiquidityAction::new(
            Arc::new(chain),
            feed_with_score(10, Decimal::ZERO),
            "weth-usdc",
            LiquidityConfig::default(),
            &scoring(),
        );
        assert!(underperforming.should_start(&[]));
    }

    #[tokio::test]
    async fn withdraw_declines_with_empty_pool() {
        let mut chain = mock_chain();
        chain
            .expect_pool_position()
            .returning(|_| Ok(Decimal::ZERO));

        let action = RemoveLiquidityAction::new(
            Arc::new(chain),
            feed_with_score(10, Decimal::ZERO),
            "weth-usdc",
            LiquidityConfig::default(),
            &scoring(),
        );

        match action.start(&[], false).await.unwrap() {
            StartOutcome::NotStarted { reason } => {
                assert!(reason.contains("nothing deployed"), "got: {}", reason)
            }
            other => panic!("expected decline, got {:?}", other),
        }
    }
}
