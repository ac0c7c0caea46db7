use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::domain::{ResourceLock, StartOutcome, Task};
use crate::error::Result;

/// A named, declarative description of a schedulable operation.
///
/// Definitions are stateless apart from configuration and small one-shot
/// state held in explicit fields. The runner calls `update` on the
/// definition's active task once per tick and `start` when the definition is
/// eligible; both may suspend on chain or backend I/O. `should_start` must
/// not block: it reads the in-memory score snapshot and the active task list
/// only.
#[async_trait]
pub trait ActionDefinition: Send + Sync {
    /// Stable identifier; recorded on every task this definition produces
    fn name(&self) -> &str;

    /// Resource locks held for the lifetime of this definition's task
    fn lock_resources(&self) -> Vec<ResourceLock>;

    /// Whether the action is currently warranted
    fn should_start(&self, active_tasks: &[Task]) -> bool;

    /// Attempt to create a new task. May decline with `NotStarted` after
    /// re-checking chain state. `force` bypasses the gating re-checks, not
    /// balance safety.
    async fn start(&self, active_tasks: &[Task], force: bool) -> Result<StartOutcome>;

    /// Advance the task by one step and return its next state. The first
    /// call on a pre-start task performs the pre-start to running transition
    /// before any of its own work.
    async fn update(&self, task: Task) -> Result<Task>;

    /// Best-effort external cancellation hook; the run loop never calls this
    async fn stop(&self) -> Result<()> {
        Ok(())
    }
}

/// Debounce gate shared by the built-in actions: once armed, `ready()` stays
/// false until the window has elapsed. Keeps marginal score wiggles from
/// re-triggering costly on-chain work every tick.
pub struct CooldownGate {
    window_secs: i64,
    /// Unix seconds of the last arm; 0 means never armed
    last_finished: AtomicI64,
}

impl CooldownGate {
    pub fn new(window_secs: u64) -> Self {
        Self {
            window_secs: window_secs as i64,
            last_finished: AtomicI64::new(0),
        }
    }

    pub fn ready(&self) -> bool {
        let last = self.last_finished.load(Ordering::Relaxed);
        last == 0 || Utc::now().timestamp() - last >= self.window_secs
    }

    pub fn arm(&self) {
        self.last_finished
            .store(Utc::now().timestamp(), Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_starts_ready_and_blocks_once_armed() {
        let gate = CooldownGate::new(300);
        assert!(gate.ready());

        gate.arm();
        assert!(!gate.ready());
    }

    #[test]
    fn zero_window_never_blocks() {
        let gate = CooldownGate::new(0);
        gate.arm();
        assert!(gate.ready());
    }
}
