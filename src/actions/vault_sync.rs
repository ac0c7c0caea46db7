use async_trait::async_trait;
use std::sync::Arc;

use crate::chain::ChainClient;
use crate::config::VaultSyncConfig;
use crate::domain::{ResourceLock, StartOutcome, Task, TaskData, TaskStatus};
use crate::error::Result;
use crate::retry::{with_retry, RetryPolicy};

use super::{ActionDefinition, CooldownGate};

/// Periodic refresh of one chain's vault state.
///
/// Two-step lifecycle: the first update moves the task to running, the
/// second reads the buffer and deployed balances and completes.
pub struct VaultSyncAction {
    name: String,
    chain: Arc<dyn ChainClient>,
    quote_asset: String,
    reference_pair: String,
    cooldown: CooldownGate,
}

impl VaultSyncAction {
    pub fn new(
        chain: Arc<dyn ChainClient>,
        quote_asset: &str,
        reference_pair: &str,
        config: &VaultSyncConfig,
    ) -> Self {
        Self {
            name: format!("vault-sync-{}", chain.name()),
            chain,
            quote_asset: quote_asset.to_string(),
            reference_pair: reference_pair.to_string(),
            cooldown: CooldownGate::new(config.cooldown_secs),
        }
    }
}

#[async_trait]
impl ActionDefinition for VaultSyncAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn lock_resources(&self) -> Vec<ResourceLock> {
        vec![ResourceLock::vault(self.chain.chain_id())]
    }

    fn should_start(&self, _active_tasks: &[Task]) -> bool {
        self.cooldown.ready()
    }

    async fn start(&self, _active_tasks: &[Task], _force: bool) -> Result<StartOutcome> {
        let task = Task::new(
            &self.name,
            self.lock_resources(),
            TaskData::VaultSync {
                chain_id: self.chain.chain_id(),
            },
        );
        Ok(StartOutcome::Started(task))
    }

    async fn update(&self, mut task: Task) -> Result<Task> {
        match task.status {
            TaskStatus::PreStart => {
                task.mark_running("reading vault state");
                Ok(task)
            }
            TaskStatus::Running => {
                let read = RetryPolicy::read();
                let buffer = with_retry("vault_balance", &read, || {
                    self.chain.vault_balance(&self.quote_asset)
                })
                .await?;
                let deployed = with_retry("pool_position", &read, || {
                    self.chain.pool_position(&self.reference_pair)
                })
                .await?;

                task.complete(format!(
                    "vault synced: buffer={} {}, deployed={}",
                    buffer, self.quote_asset, deployed
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
    use rust_decimal::Decimal;

    fn mock_chain() -> MockChainClient {
        let mut chain = MockChainClient::new();
        chain.expect_chain_id().return_const(8453u64);
        chain.expect_name().return_const("base".to_string());
        chain
    }

    #[tokio::test]
    async fn two_updates_reach_completed() {
        let mut chain = mock_chain();
        chain
            .expect_vault_balance()
            .returning(|_| Ok(Decimal::new(1_000, 0)));
        chain
            .expect_pool_position()
            .returning(|_| Ok(Decimal::new(4_000, 0)));

        let action = VaultSyncAction::new(
            Arc::new(chain),
            "usdc",
            "weth-usdc",
            &VaultSyncConfig::default(),
        );
        assert!(action.should_start(&[]));

        let outcome = action.start(&[], false).await.unwrap();
        let task = match outcome {
            StartOutcome::Started(task) => task,
            other => panic!("expected a task, got {:?}", other),
        };
        assert_eq!(task.status, TaskStatus::PreStart);
        assert_eq!(task.resources_taken, vec![ResourceLock::vault(8453)]);

        let task = action.update(task).await.unwrap();
        assert_eq!(task.status, TaskStatus::Running);

        let task = action.update(task).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert!(task.status_message.contains("buffer=1000"));
        assert!(task.finished_at.is_some());
    }

    #[tokio::test]
    async fn cooldown_blocks_immediate_restart() {
        let mut chain = mock_chain();
        chain
            .expect_vault_balance()
            .returning(|_| Ok(Decimal::ZERO));
        chain
            .expect_pool_position()
            .returning(|_| Ok(Decimal::ZERO));

        let action = VaultSyncAction::new(
            Arc::new(chain),
            "usdc",
            "weth-usdc",
            &VaultSyncConfig { cooldown_secs: 300 },
        );

        let task = match action.start(&[], false).await.unwrap() {
            StartOutcome::Started(task) => task,
            other => panic!("expected a task, got {:?}", other),
        };
        let task = action.update(task).await.unwrap();
        let task = action.update(task).await.unwrap();
        assert_eq!(task.status, TaskStatus::Completed);

        assert!(!action.should_start(&[]));
    }
}
