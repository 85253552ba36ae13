//! Processor error types.

use shared_queue::QueueError;
use thiserror::Error;

/// Invalid processor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Work queue name must not be empty")]
    EmptyQueueName,

    #[error("Command name must not be empty")]
    EmptyCommandName,

    #[error("Command '{0}' is registered twice")]
    DuplicateCommand(String),

    #[error("Pool size must be at least 1")]
    InvalidPoolSize,

    #[error("Receive batch size must be between 1 and 10, got {0}")]
    InvalidBatchSize(usize),

    #[error("Reply attempts must be at least 1")]
    InvalidReplyAttempts,

    #[error("{0} must be positive")]
    ZeroDuration(&'static str),
}

/// Failure starting a processor.
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Work queue '{queue}' unavailable: {source}")]
    QueueUnavailable {
        queue: String,
        #[source]
        source: QueueError,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),
}
