use thiserror::Error;

/// Failure reported by a task callback. Any variant evicts the task.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The callback ran and reported a failure.
    #[error("Task failed: {0}")]
    Failed(String),

    /// Underlying I/O error (e.g. a write to a peer).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The resource the task serves is gone.
    #[error("Closed: {0}")]
    Closed(String),

    /// The callback panicked; the payload message is captured when possible.
    #[error("Task panicked: {0}")]
    Panicked(String),
}

impl TaskError {
    pub fn failed(reason: impl Into<String>) -> Self {
        TaskError::Failed(reason.into())
    }

    /// Short error code string used in log fields and eviction reports.
    pub fn code(&self) -> &'static str {
        match self {
            TaskError::Failed(_) => "TASK_FAILED",
            TaskError::Io(_) => "IO_ERROR",
            TaskError::Closed(_) => "CLOSED",
            TaskError::Panicked(_) => "PANICKED",
        }
    }
}
