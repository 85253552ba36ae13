//! Queue Service errors.

use thiserror::Error;

/// Failure reported by a queue adapter.
#[derive(Debug, Clone, Error)]
pub enum QueueError {
    /// The queue does not exist (never created, deleted or reclaimed).
    #[error("Queue not found: {queue}")]
    NotFound { queue: String },

    /// The address does not belong to this queue service.
    #[error("Invalid queue address: {0}")]
    InvalidAddress(String),

    /// The queue name contains unsupported characters.
    #[error("Invalid queue name: {0}")]
    InvalidName(String),

    /// Stored queue data could not be read back.
    #[error("Corrupt queue data: {0}")]
    Corrupt(String),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Transient failure; the call may succeed if retried.
    #[error("Queue service unavailable: {0}")]
    Unavailable(String),
}

impl QueueError {
    pub fn not_found(queue: impl Into<String>) -> Self {
        QueueError::NotFound {
            queue: queue.into(),
        }
    }

    /// True when the target queue is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(self, QueueError::NotFound { .. })
    }

    /// True when retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, QueueError::Io(_) | QueueError::Unavailable(_))
    }
}

impl From<std::io::Error> for QueueError {
    fn from(err: std::io::Error) -> Self {
        QueueError::Io(err.to_string())
    }
}

/// Result type for queue operations
pub type QueueResult<T> = Result<T, QueueError>;
