//! Error types for checkpoint operations

use thiserror::Error;

/// Result type for checkpoint operations
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Errors that can occur during checkpoint operations
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// No checkpoint exists for the requested thread/step
    #[error("Checkpoint not found: thread '{thread_id}' step {step}")]
    NotFound {
        /// Thread that was queried
        thread_id: String,
        /// Step that was requested
        step: u64,
    },

    /// An append would break the strictly increasing step order of a thread
    #[error("Checkpoint conflict on thread '{thread_id}': step {step} is not after latest step {latest}")]
    Conflict {
        thread_id: String,
        step: u64,
        latest: u64,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Storage backend error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid checkpoint
    #[error("Invalid checkpoint: {0}")]
    Invalid(String),
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for CheckpointError {
    fn from(err: sqlx::Error) -> Self {
        CheckpointError::Storage(err.to_string())
    }
}
