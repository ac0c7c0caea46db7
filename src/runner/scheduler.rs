use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::error::Result;

use super::ActionRunner;

/// Owns the tick loop exclusively. Each tick is awaited inline, so a slow
/// tick delays the next firing instead of overlapping it; the resource-lock
/// invariant never sees a re-entrant tick.
pub struct Scheduler {
    runner: ActionRunner,
    tick_interval: Duration,
}

impl Scheduler {
    pub fn new(runner: ActionRunner, tick_interval: Duration) -> Self {
        Self {
            runner,
            tick_interval,
        }
    }

    pub fn runner(&self) -> &ActionRunner {
        &self.runner
    }

    /// Run ticks until shutdown is signalled. A failed tick is logged and
    /// the loop keeps going; the next tick retries from persisted state.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "Scheduler running with a {}ms tick",
            self.tick_interval.as_millis()
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let tick_started = Instant::now();
                    match self.runner.run_action_loop().await {
                        Ok(summary) => debug!(
                            "Tick finished in {:?}: {} updated, {} errored, {} started",
                            tick_started.elapsed(),
                            summary.updated,
                            summary.errored,
                            summary.started
                        ),
                        Err(e) => error!("Tick failed: {}", e),
                    }
                }
                _ = shutdown.changed() => {
                    info!("Scheduler stopping");
                    break;
                }
            }
        }

        Ok(())
    }
}
