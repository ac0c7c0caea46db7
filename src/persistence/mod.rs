//! Persistence Layer for Task History and Crash Recovery
//!
//! The task store is the durable record of every task ever created. Active
//! tasks are reloaded from it at the start of every scheduling tick, which is
//! what lets the agent resume in-flight work after a crash.

pub mod memory;
pub mod task_store;

pub use memory::MemoryTaskStore;
pub use task_store::{SqliteTaskStore, TaskStore};
