use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

use crate::chain::ChainClient;
use crate::config::{ScoringConfig, SwapConfig};
use crate::domain::{ResourceLock, StartOutcome, Task, TaskData, TaskStatus};
use crate::error::Result;
use crate::retry::{with_retry, RetryPolicy};
use crate::scoring::ScoreFeedHandle;

use super::{ActionDefinition, CooldownGate};

/// Swap excess non-quote inventory into the quote asset on one chain.
///
/// Only warranted while the chain's opportunity score clears the configured
/// floor; the actual balance check happens in `start`, which may decline.
pub struct SwapAction {
    name: String,
    chain: Arc<dyn ChainClient>,
    feed: ScoreFeedHandle,
    config: SwapConfig,
    quote_asset: String,
    min_score: Decimal,
    stale_after: Duration,
    cooldown: CooldownGate,
}

impl SwapAction {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        feed: ScoreFeedHandle,
        quote_asset: &str,
        config: SwapConfig,
        scoring: &ScoringConfig,
    ) -> Self {
        Self {
            name: format!("swap-{}-{}", config.sell_asset, chain.name()),
            chain,
            feed,
            cooldown: CooldownGate::new(config.cooldown_secs),
            config,
            quote_asset: quote_asset.to_string(),
            min_score: scoring.min_score,
            stale_after: Duration::from_millis(scoring.stale_after_ms),
        }
    }

    fn score_clears_floor(&self) -> bool {
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
impl ActionDefinition for SwapAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn lock_resources(&self) -> Vec<ResourceLock> {
        vec![ResourceLock::vault(self.chain.chain_id())]
    }

    fn should_start(&self, _active_tasks: &[Task]) -> bool {
        self.cooldown.ready() && self.score_clears_floor()
    }

    async fn start(&self, _active_tasks: &[Task], force: bool) -> Result<StartOutcome> {
        if !force && !self.score_clears_floor() {
            return Ok(StartOutcome::declined("score dropped below floor"));
        }

        let balance = with_retry("vault_balance", &RetryPolicy::read(), || {
            self.chain.vault_balance(&self.config.sell_asset)
        })
        .await?;

        if balance < self.config.min_sell_balance {
            return Ok(StartOutcome::declined(format!(
                "vault holds {} {}, below swap threshold {}",
                balance, self.config.sell_asset, self.config.min_sell_balance
            )));
        }

        let amount = self.config.amount.min(balance);
        let task = Task::new(
            &self.name,
            self.lock_resources(),
            TaskData::Swap {
                chain_id: self.chain.chain_id(),
                sell_asset: self.config.sell_asset.clone(),
                buy_asset: self.quote_asset.clone(),
                amount,
            },
        );
        Ok(StartOutcome::Started(task))
    }

    async fn update(&self, mut task: Task) -> Result<Task> {
        match task.status {
            TaskStatus::PreStart => {
                // Single-step action: submit and settle on the first update
                task.mark_running("submitting swap");

                let TaskData::Swap {
                    sell_asset,
                    buy_asset,
                    amount,
                    ..
                } = task.task_data.clone()
                else {
                    return Err(crate::error::LaminarError::Internal(format!(
                        "task {} carries a non-swap payload",
                        task.id
                    )));
                };

                let tx_hash = with_retry("swap", &RetryPolicy::write(), || {
                    self.chain.swap(&sell_asset, &buy_asset, amount)
                })
                .await?;

                task.complete(format!(
                    "swapped {} {} into {}: {}",
                    amount, sell_asset, buy_asset, tx_hash
                ));
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

    fn fresh_feed(chain_id: u64, score: Decimal) -> ScoreFeedHandle {
        let cfg = scoring();
        let chain_score = cfg.score(chain_id, score, Decimal::ZERO, Decimal::ZERO);
        ScoreFeedHandle::fixed(OpportunitySnapshot {
            scores: [(chain_id, chain_score)].into_iter().collect(),
            computed_at: Some(Utc::now()),
        })
    }

    fn mock_chain() -> MockChainClient {
        let mut chain = MockChainClient::new();
        chain.expect_chain_id().return_const(8453u64);
        chain.expect_name().return_const("base".to_string());
        chain
    }

    #[tokio::test]
    async fn declines_below_swap_threshold() {
        let mut chain = mock_chain();
        chain
            .expect_vault_balance()
            .returning(|_| Ok(Decimal::new(1, 1)));

        let action = SwapAction::new(
            Arc::new(chain),
            fresh_feed(8453, Decimal::TEN),
            "usdc",
            SwapConfig::default(),
            &scoring(),
        );

        match action.start(&[], false).await.unwrap() {
            StartOutcome::NotStarted { reason } => {
                assert!(reason.contains("below swap threshold"), "got: {}", reason)
            }
            other => panic!("expected decline, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn stale_feed_suppresses_eligibility() {
        let chain = mock_chain();
        let action = SwapAction::new(
            Arc::new(chain),
            ScoreFeedHandle::fixed(OpportunitySnapshot::default()),
            "usdc",
            SwapConfig::default(),
            &scoring(),
        );
        assert!(!action.should_start(&[]));
    }

    #[tokio::test]
    async fn swap_settles_on_first_update() {
        let mut chain = mock_chain();
        chain
            .expect_vault_balance()
            .returning(|_| Ok(Decimal::new(5, 0)));
        chain
            .expect_swap()
            .times(1)
            .returning(|_, _, _| Ok("0xabc".to_string()));

        let action = SwapAction::new(
            Arc::new(chain),
            fresh_feed(8453, Decimal::TEN),
            "usdc",
            SwapConfig::default(),
            &scoring(),
        );
        assert!(action.should_start(&[]));

        let task = match action.start(&[], false).await.unwrap() {
            StartOutcome::Started(task) => task,
            other => panic!("expected a task, got {:?}", other),
        };

        let task = action.update(task).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.status_message.contains("0xabc"));
        // Cooldown armed by completion
        assert!(!action.should_start(&[]));
    }
}
