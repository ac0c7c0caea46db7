//! Action runner and tick driver
//!
//! `ActionRunner::run_action_loop` executes exactly one scheduling tick:
//! update every active task, recompute the free resources, then start newly
//! eligible definitions. `Scheduler` owns the external timer and guarantees
//! ticks never overlap.

pub mod runner;
pub mod scheduler;

pub use runner::{ActionRunner, TickSummary};
pub use scheduler::Scheduler;
