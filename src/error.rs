use thiserror::Error;

/// Main error type for the rebalancing agent
#[derive(Error, Debug)]
pub enum LaminarError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("RPC error on chain {chain_id}: {message}")]
    Rpc { chain_id: u64, message: String },

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Task store errors
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Duplicate task id: {0}")]
    DuplicateTask(String),

    #[error("Task {0} is already in a terminal status")]
    TaskFinished(String),

    // Scoring feed errors
    #[error("Score unavailable for chain: {0}")]
    ScoreUnavailable(u64),

    #[error("Stale data: {0}")]
    StaleData(String),

    // Chain boundary errors
    #[error("Chain call failed: {0}")]
    ChainCall(String),

    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),

    // Bridge backend errors
    #[error("Bridge transfer failed: {0}")]
    BridgeTransfer(String),

    #[error("Bridge transfer not found: {0}")]
    BridgeTransferNotFound(String),

    // Retry errors
    #[error("Operation '{name}' timed out after {elapsed_ms}ms")]
    Timeout { name: String, elapsed_ms: u64 },

    #[error("Operation '{name}' exhausted {attempts} attempts: {last_error}")]
    RetriesExhausted {
        name: String,
        attempts: u32,
        last_error: String,
    },

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for LaminarError
pub type Result<T> = std::result::Result<T, LaminarError>;
