use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::chain::{BridgeClient, BridgeTransferStatus, ChainClient};
use crate::config::{RebalanceConfig, ScoringConfig};
use crate::domain::{BridgePhase, ResourceLock, StartOutcome, Task, TaskData, TaskStatus};
use crate::error::{LaminarError, Result};
use crate::retry::{with_retry, RetryPolicy};
use crate::scoring::ScoreFeedHandle;

use super::{ActionDefinition, CooldownGate};

/// Move quote-asset liquidity from a low-score chain to a high-score chain
/// through the bridge backend.
///
/// One definition exists per directed chain pair; it only fires when the
/// score feed's rebalance route points exactly at this pair. The task is
/// multi-phase: initiate the transfer, then poll the backend by correlation
/// id until it settles. Both vault buffers plus the source bridge lane stay
/// locked for the whole flight.
pub struct BridgeRebalanceAction {
    name: String,
    source: Arc<dyn ChainClient>,
    dest: Arc<dyn ChainClient>,
    bridge: Arc<dyn BridgeClient>,
    feed: ScoreFeedHandle,
    config: RebalanceConfig,
    min_score_delta: Decimal,
    stale_after: Duration,
    cooldown: CooldownGate,
}

impl BridgeRebalanceAction {
    pub fn new(
        source: Arc<dyn ChainClient>,
        dest: Arc<dyn ChainClient>,
        bridge: Arc<dyn BridgeClient>,
        feed: ScoreFeedHandle,
        config: RebalanceConfig,
        scoring: &ScoringConfig,
    ) -> Self {
        Self {
            name: format!("bridge-{}-{}", source.name(), dest.name()),
            source,
            dest,
            bridge,
            feed,
            cooldown: CooldownGate::new(config.cooldown_secs),
            config,
            min_score_delta: scoring.min_score_delta,
            stale_after: Duration::from_millis(scoring.stale_after_ms),
        }
    }

    /// The feed's current route must point at this exact pair
    fn route_selected(&self) -> bool {
        let snapshot = self.feed.snapshot();
        if snapshot.is_stale(self.stale_after) {
            return false;
        }
        match snapshot.rebalance_route(self.min_score_delta) {
            Some((worst, best)) => {
                worst.chain_id == self.source.chain_id() && best.chain_id == self.dest.chain_id()
            }
            None => false,
        }
    }

    async fn initiate(&self, task: &mut Task) -> Result<()> {
        let TaskData::Bridge {
            source_chain,
            dest_chain,
            asset,
            amount,
            ..
        } = task.task_data.clone()
        else {
            return Err(LaminarError::Internal(format!(
                "task {} carries a non-bridge payload",
                task.id
            )));
        };

        let quote = with_retry("bridge_quote", &RetryPolicy::read(), || {
            self.bridge.quote(source_chain, dest_chain, &asset, amount)
        })
        .await?;
        debug!(
            "Bridge quote {} -> {}: fee={}, eta={}s",
            source_chain, dest_chain, quote.fee, quote.estimated_seconds
        );

        let correlation_id = with_retry("bridge_initiate", &RetryPolicy::write(), || {
            self.bridge
                .initiate_transfer(source_chain, dest_chain, &asset, amount)
        })
        .await?;
        info!(
            "Bridge transfer {} submitted: {} {} from {} to {}",
            correlation_id, amount, asset, source_chain, dest_chain
        );

        task.task_data = TaskData::Bridge {
            source_chain,
            dest_chain,
            asset,
            amount,
            phase: BridgePhase::AwaitCompletion,
            correlation_id: Some(correlation_id.clone()),
        };
        task.status_message = format!("transfer {} submitted", correlation_id);
        task.touch();
        Ok(())
    }

    async fn poll(&self, task: &mut Task) -> Result<()> {
        let TaskData::Bridge {
            correlation_id: Some(correlation_id),
            ..
        } = task.task_data.clone()
        else {
            return Err(LaminarError::Internal(format!(
                "task {} awaits completion without a correlation id",
                task.id
            )));
        };

        let status = with_retry("bridge_status", &RetryPolicy::read(), || {
            self.bridge.transfer_status(&correlation_id)
        })
        .await?;

        match status {
            BridgeTransferStatus::Pending => {
                task.status_message = format!("transfer {} in flight", correlation_id);
                task.touch();
            }
            BridgeTransferStatus::Completed => {
                task.complete(format!("transfer {} settled", correlation_id));
                self.cooldown.arm();
            }
            BridgeTransferStatus::Failed(reason) => {
                // Backend-reported failure, not an exception in this agent
                task.fail(format!("transfer {} failed: {}", correlation_id, reason));
                self.cooldown.arm();
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ActionDefinition for BridgeRebalanceAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn lock_resources(&self) -> Vec<ResourceLock> {
        vec![
            ResourceLock::vault(self.source.chain_id()),
            ResourceLock::vault(self.dest.chain_id()),
            ResourceLock::bridge(self.source.chain_id()),
        ]
    }

    fn should_start(&self, active_tasks: &[Task]) -> bool {
        // Only one cross-chain transfer in flight across all pairs
        let another_in_flight = active_tasks
            .iter()
            .any(|t| t.definition_name.starts_with("bridge-"));
        self.cooldown.ready() && !another_in_flight && self.route_selected()
    }

    async fn start(&self, _active_tasks: &[Task], force: bool) -> Result<StartOutcome> {
        if !force && !self.route_selected() {
            return Ok(StartOutcome::declined("route no longer selected"));
        }

        let balance = with_retry("vault_balance", &RetryPolicy::read(), || {
            self.source.vault_balance(&self.config.asset)
        })
        .await?;

        if balance < self.config.transfer_amount {
            return Ok(StartOutcome::declined(format!(
                "source vault holds {} {}, transfer needs {}",
                balance, self.config.asset, self.config.transfer_amount
            )));
        }

        let task = Task::new(
            &self.name,
            self.lock_resources(),
            TaskData::Bridge {
                source_chain: self.source.chain_id(),
                dest_chain: self.dest.chain_id(),
                asset: self.config.asset.clone(),
                amount: self.config.transfer_amount,
                phase: BridgePhase::Initiate,
                correlation_id: None,
            },
        );
        Ok(StartOutcome::Started(task))
    }

    async fn update(&self, mut task: Task) -> Result<Task> {
        match task.status {
            TaskStatus::PreStart => {
                task.mark_running("preparing bridge transfer");
                Ok(task)
            }
            TaskStatus::Running => {
                let phase = match task.task_data {
                    TaskData::Bridge { phase, .. } => phase,
                    _ => {
                        return Err(LaminarError::Internal(format!(
                            "task {} carries a non-bridge payload",
                            task.id
                        )))
                    }
                };
                match phase {
                    BridgePhase::Initiate => self.initiate(&mut task).await?,
                    BridgePhase::AwaitCompletion => self.poll(&mut task).await?,
                }
                Ok(task)
            }
            _ => Ok(task),
        }
    }

    async fn stop(&self) -> Result<()> {
        // An in-flight transfer cannot be recalled; the backend settles it
        // either way and the next poll records the outcome.
        info!("{}: stop requested; transfer left to settle", self.name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{MockBridgeClient, MockChainClient};
    use crate::config::AppConfig;
    use crate::scoring::OpportunitySnapshot;
    use chrono::Utc;

    fn scoring() -> ScoringConfig {
        AppConfig::default_dry_run().scoring
    }

    fn spread_feed(low: (u64, Decimal), high: (u64, Decimal)) -> ScoreFeedHandle {
        let cfg = scoring();
        let scores = [low, high]
            .into_iter()
            .map(|(id, y)| (id, cfg.score(id, y, Decimal::ZERO, Decimal::ZERO)))
            .collect();
        ScoreFeedHandle::fixed(OpportunitySnapshot {
            scores,
            computed_at: Some(Utc::now()),
        })
    }

    fn mock_chain(id: u64, name: &str) -> Arc<MockChainClient> {
        let mut chain = MockChainClient::new();
        chain.expect_chain_id().return_const(id);
        chain.expect_name().return_const(name.to_string());
        Arc::new(chain)
    }

    fn action_with_bridge(bridge: MockBridgeClient) -> BridgeRebalanceAction {
        BridgeRebalanceAction::new(
            mock_chain(1, "mainnet"),
            mock_chain(8453, "base"),
            Arc::new(bridge),
            spread_feed((1, Decimal::ZERO), (8453, Decimal::TEN)),
            RebalanceConfig::default(),
            &scoring(),
        )
    }

    #[test]
    fn should_start_requires_matching_route_and_free_lane() {
        let action = action_with_bridge(MockBridgeClient::new());
        assert!(action.should_start(&[]));

        // Another bridge task anywhere in the fleet blocks this pair
        let other = Task::new("bridge-base-mainnet", vec![], TaskData::Empty);
        assert!(!action.should_start(&[other]));
    }

    #[test]
    fn narrow_spread_deselects_the_route() {
        let cfg = scoring();
        let scores = [
            (1u64, cfg.score(1, Decimal::ONE, Decimal::ZERO, Decimal::ZERO)),
            (
                8453u64,
                cfg.score(8453, Decimal::new(12, 1), Decimal::ZERO, Decimal::ZERO),
            ),
        ]
        .into_iter()
        .collect();
        let feed = ScoreFeedHandle::fixed(OpportunitySnapshot {
            scores,
            computed_at: Some(Utc::now()),
        });

        let action = BridgeRebalanceAction::new(
            mock_chain(1, "mainnet"),
            mock_chain(8453, "base"),
            Arc::new(MockBridgeClient::new()),
            feed,
            RebalanceConfig::default(),
            &scoring(),
        );
        assert!(!action.should_start(&[]));
    }

    #[tokio::test]
    async fn transfer_progresses_through_phases() {
        let mut source = MockChainClient::new();
        source.expect_chain_id().return_const(1u64);
        source.expect_name().return_const("mainnet".to_string());
        source
            .expect_vault_balance()
            .returning(|_| Ok(Decimal::new(10_000, 0)));

        let mut bridge = MockBridgeClient::new();
        bridge.expect_quote().returning(|_, _, _, amount| {
            Ok(crate::chain::BridgeQuote {
                fee: amount * Decimal::new(1, 3),
                estimated_seconds: 60,
            })
        });
        bridge
            .expect_initiate_transfer()
            .times(1)
            .returning(|_, _, _, _| Ok("xfer-7".to_string()));
        let mut polls = 0u32;
        bridge.expect_transfer_status().returning(move |_| {
            polls += 1;
            if polls < 2 {
                Ok(BridgeTransferStatus::Pending)
            } else {
                Ok(BridgeTransferStatus::Completed)
            }
        });

        let action = BridgeRebalanceAction::new(
            Arc::new(source),
            mock_chain(8453, "base"),
            Arc::new(bridge),
            spread_feed((1, Decimal::ZERO), (8453, Decimal::TEN)),
            RebalanceConfig::default(),
            &scoring(),
        );

        let task = match action.start(&[], false).await.unwrap() {
            StartOutcome::Started(task) => task,
            other => panic!("expected a task, got {:?}", other),
        };

        // pre-start -> running
        let task = action.update(task).await.unwrap();
        assert_eq!(task.status, TaskStatus::Running);

        // initiate
        let task = action.update(task).await.unwrap();
        assert!(task.status_message.contains("xfer-7 submitted"));
        assert!(matches!(
            task.task_data,
            TaskData::Bridge {
                phase: BridgePhase::AwaitCompletion,
                correlation_id: Some(_),
                ..
            }
        ));

        // first poll: still pending
        let task = action.update(task).await.unwrap();
        assert_eq!(task.status, TaskStatus::Running);
        assert!(task.status_message.contains("in flight"));

        // second poll: settled
        let task = action.update(task).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.finished_at.is_some());
    }

    #[tokio::test]
    async fn backend_failure_marks_the_task_failed() {
        let mut source = MockChainClient::new();
        source.expect_chain_id().return_const(1u64);
        source.expect_name().return_const("mainnet".to_string());
        source
            .expect_vault_balance()
            .returning(|_| Ok(Decimal::new(10_000, 0)));

        let mut bridge = MockBridgeClient::new();
        bridge.expect_quote().returning(|_, _, _, _| {
            Ok(crate::chain::BridgeQuote {
                fee: Decimal::ONE,
                estimated_seconds: 60,
            })
        });
        bridge
            .expect_initiate_transfer()
            .returning(|_, _, _, _| Ok("xfer-9".to_string()));
        bridge
            .expect_transfer_status()
            .returning(|_| Ok(BridgeTransferStatus::Failed("lane halted".to_string())));

        let action = BridgeRebalanceAction::new(
            Arc::new(source),
            mock_chain(8453, "base"),
            Arc::new(bridge),
            spread_feed((1, Decimal::ZERO), (8453, Decimal::TEN)),
            RebalanceConfig::default(),
            &scoring(),
        );

        let task = match action.start(&[], false).await.unwrap() {
            StartOutcome::Started(task) => task,
            other => panic!("expected a task, got {:?}", other),
        };
        let task = action.update(task).await.unwrap(); // running
        let task = action.update(task).await.unwrap(); // initiate
        let task = action.update(task).await.unwrap(); // failed poll

        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.status_message.contains("lane halted"));
        assert!(task.finished_at.is_some());
    }

    #[tokio::test]
    async fn start_declines_when_source_vault_is_short() {
        let mut source = MockChainClient::new();
        source.expect_chain_id().return_const(1u64);
        source.expect_name().return_const("mainnet".to_string());
        source
            .expect_vault_balance()
            .returning(|_| Ok(Decimal::new(100, 0)));

        let action = BridgeRebalanceAction::new(
            Arc::new(source),
            mock_chain(8453, "base"),
            Arc::new(MockBridgeClient::new()),
            spread_feed((1, Decimal::ZERO), (8453, Decimal::TEN)),
            RebalanceConfig::default(),
            &scoring(),
        );

        match action.start(&[], false).await.unwrap() {
            StartOutcome::NotStarted { reason } => {
                assert!(reason.contains("transfer needs"), "got: {}", reason)
            }
            other => panic!("expected decline, got {:?}", other),
        }
    }
}
