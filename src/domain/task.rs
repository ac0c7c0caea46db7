use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ResourceLock;

/// Task status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Task created but not yet advanced by its first update
    PreStart,
    /// Task in progress
    Running,
    /// Task finished successfully
    Completed,
    /// Task aborted by an update error
    Error,
    /// Task finished with an explicit business-logic failure
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Error | TaskStatus::Failed
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TaskStatus::PreStart | TaskStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::PreStart => "pre-start",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Error => "error",
            TaskStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = &'static str;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw {
            "pre-start" => Ok(TaskStatus::PreStart),
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "error" => Ok(TaskStatus::Error),
            "failed" => Ok(TaskStatus::Failed),
            _ => Err("invalid task status"),
        }
    }
}

/// Progress of a cross-chain transfer task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BridgePhase {
    /// Transfer not yet submitted to the bridge backend
    Initiate,
    /// Transfer submitted; polling the backend by correlation id
    AwaitCompletion,
}

/// Action-specific task payload, tagged by the action kind that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TaskData {
    VaultSync {
        chain_id: u64,
    },
    Swap {
        chain_id: u64,
        sell_asset: String,
        buy_asset: String,
        amount: Decimal,
    },
    AddLiquidity {
        chain_id: u64,
        pair: String,
        amount: Decimal,
    },
    RemoveLiquidity {
        chain_id: u64,
        pair: String,
        amount: Decimal,
    },
    Bridge {
        source_chain: u64,
        dest_chain: u64,
        asset: String,
        amount: Decimal,
        phase: BridgePhase,
        /// Assigned by the bridge backend once the transfer is submitted
        correlation_id: Option<String>,
    },
    /// Payload-free task
    Empty,
}

/// One attempted or completed execution of an action definition.
///
/// Retained indefinitely in the task store as an audit record once terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub definition_name: String,
    pub status: TaskStatus,
    pub resources_taken: Vec<ResourceLock>,
    pub started_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub status_message: String,
    pub task_data: TaskData,
}

impl Task {
    /// Create a fresh pre-start task for a definition
    pub fn new(definition_name: &str, resources: Vec<ResourceLock>, data: TaskData) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            definition_name: definition_name.to_string(),
            status: TaskStatus::PreStart,
            resources_taken: resources,
            started_at: now,
            last_updated_at: now,
            finished_at: None,
            status_message: "created".to_string(),
            task_data: data,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Refresh `last_updated_at`, keeping it monotonically non-decreasing
    pub fn touch(&mut self) {
        let now = Utc::now();
        if now > self.last_updated_at {
            self.last_updated_at = now;
        }
    }

    /// The expected first step of every task: pre-start → running
    pub fn mark_running(&mut self, message: impl Into<String>) {
        debug_assert_eq!(self.status, TaskStatus::PreStart);
        self.status = TaskStatus::Running;
        self.status_message = message.into();
        self.touch();
    }

    pub fn complete(&mut self, message: impl Into<String>) {
        self.finish(TaskStatus::Completed, message);
    }

    /// Explicit business-logic failure, distinct from an update exception
    pub fn fail(&mut self, message: impl Into<String>) {
        self.finish(TaskStatus::Failed, message);
    }

    /// Record an update error
    pub fn record_error(&mut self, message: impl Into<String>) {
        self.finish(TaskStatus::Error, message);
    }

    fn finish(&mut self, status: TaskStatus, message: impl Into<String>) {
        debug_assert!(status.is_terminal());
        self.status = status;
        self.status_message = message.into();
        self.touch();
        self.finished_at = Some(self.last_updated_at);
    }

    pub fn holds(&self, lock: &ResourceLock) -> bool {
        self.resources_taken.contains(lock)
    }
}

/// Result of asking an action definition to start
#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    /// A new pre-start task was created and should be persisted
    Started(Task),
    /// The definition declined to start
    NotStarted { reason: String },
}

impl StartOutcome {
    pub fn declined(reason: impl Into<String>) -> Self {
        Self::NotStarted {
            reason: reason.into(),
        }
    }
}
