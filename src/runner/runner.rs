use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::actions::ActionDefinition;
use crate::domain::{ResourceLock, StartOutcome, Task};
use crate::error::Result;
use crate::persistence::TaskStore;

/// Counters for one scheduling tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Active tasks advanced this tick
    pub updated: usize,
    /// Tasks whose update raised an error
    pub errored: usize,
    /// New tasks created this tick
    pub started: usize,
}

/// The scheduler core. Definitions are evaluated in registration order,
/// which fixes both the update order and the start order within a tick.
pub struct ActionRunner {
    definitions: Vec<Arc<dyn ActionDefinition>>,
    store: Arc<dyn TaskStore>,
}

impl ActionRunner {
    pub fn new(store: Arc<dyn TaskStore>) -> Self {
        Self {
            definitions: Vec::new(),
            store,
        }
    }

    pub fn register(&mut self, definition: Arc<dyn ActionDefinition>) {
        self.definitions.push(definition);
    }

    pub fn definitions(&self) -> &[Arc<dyn ActionDefinition>] {
        &self.definitions
    }

    /// Execute one scheduling tick end to end.
    ///
    /// Update errors are task-local: the task is persisted with status
    /// `error` and the tick continues. Store I/O errors abort the tick; the
    /// next timer firing retries from persisted state.
    pub async fn run_action_loop(&self) -> Result<TickSummary> {
        let active = self.store.get_active_tasks().await?;
        let mut summary = TickSummary::default();
        let mut processed: Vec<Task> = Vec::with_capacity(active.len());

        // Update phase: fixed definition order, then (started_at, id) order
        // within one definition as returned by the store
        for definition in &self.definitions {
            for task in active
                .iter()
                .filter(|t| t.definition_name == definition.name())
            {
                match definition.update(task.clone()).await {
                    Ok(mut next) => {
                        next.touch();
                        if next.is_terminal() {
                            next.finished_at = Some(next.last_updated_at);
                        }
                        self.store.update_task(&next).await?;
                        summary.updated += 1;
                        processed.push(next);
                    }
                    Err(e) => {
                        warn!(
                            "Update failed for task {} ({}): {}",
                            task.id,
                            definition.name(),
                            e
                        );
                        let mut errored = task.clone();
                        errored.record_error(e.to_string());
                        self.store.update_task(&errored).await?;
                        summary.errored += 1;
                        processed.push(errored);
                    }
                }
            }
        }

        // Tasks referencing definitions that are no longer registered still
        // count toward held resources while active
        for task in &active {
            if !self.has_definition(&task.definition_name) {
                warn!(
                    "Task {} references unknown definition '{}'; leaving untouched",
                    task.id, task.definition_name
                );
                processed.push(task.clone());
            }
        }

        // Resource recomputation, strictly after every update: tasks that
        // just finished no longer hold their locks, so their resources are
        // startable within this same tick
        let mut still_active: Vec<Task> = processed.into_iter().filter(|t| t.is_active()).collect();
        let mut held: HashSet<ResourceLock> = still_active
            .iter()
            .flat_map(|t| t.resources_taken.iter().cloned())
            .collect();

        // Start phase
        for definition in &self.definitions {
            if still_active
                .iter()
                .any(|t| t.definition_name == definition.name())
            {
                continue;
            }

            let needed = definition.lock_resources();
            if needed.iter().any(|lock| held.contains(lock)) {
                // Contention is not an error; re-evaluated next tick
                continue;
            }

            if !definition.should_start(&still_active) {
                continue;
            }

            match definition.start(&still_active, false).await {
                Ok(StartOutcome::Started(task)) => {
                    self.store.add_task(&task).await?;
                    info!("Started task {} ({})", task.id, definition.name());
                    held.extend(task.resources_taken.iter().cloned());
                    still_active.push(task);
                    summary.started += 1;
                }
                Ok(StartOutcome::NotStarted { reason }) => {
                    debug!("{} declined to start: {}", definition.name(), reason);
                }
                Err(e) => {
                    // Treated exactly like a decline; nothing was persisted
                    warn!("{} start failed, treating as not started: {}", definition.name(), e);
                }
            }
        }

        Ok(summary)
    }

    fn has_definition(&self, name: &str) -> bool {
        self.definitions.iter().any(|d| d.name() == name)
    }
}
