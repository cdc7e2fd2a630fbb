use pulse_scheduler::TaskError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum KeepaliveError {
    /// The peer's outbound queue is gone.
    #[error("Connection closed: {conn_id}")]
    Closed { conn_id: String },

    /// The peer is not draining its outbound queue.
    #[error("Slow consumer: {conn_id} outbound queue is full")]
    SlowConsumer { conn_id: String },

    #[error("Write failed ({conn_id}): {reason}")]
    Write { conn_id: String, reason: String },
}

impl From<KeepaliveError> for TaskError {
    fn from(e: KeepaliveError) -> Self {
        match e {
            KeepaliveError::Closed { .. } => TaskError::Closed(e.to_string()),
            other => TaskError::Failed(other.to_string()),
        }
    }
}
