use crate::models::TaskId;

/// Errors surfaced by tracking and task operations.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// No task with this id exists.
    #[error("task not found: {0}")]
    NotFound(TaskId),
}

/// Errors raised by a [`crate::storage::Persistence`] backend.
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}
