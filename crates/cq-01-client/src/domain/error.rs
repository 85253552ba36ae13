//! Client error types.

use shared_queue::QueueError;
use shared_types::{EnvelopeError, Payload, Status};
use std::time::Duration;
use thiserror::Error;

/// A non-OK reply reported by the processor.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("Command failed with status {status}: {payload}")]
pub struct ResponseError {
    pub status: Status,
    pub payload: Payload,
}

/// Failure of a client operation.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No matching reply arrived before the deadline.
    #[error("Command '{command}' timed out after {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    /// The processor answered with a non-OK status.
    #[error(transparent)]
    Response(#[from] ResponseError),

    /// `close()` was already called.
    #[error("Client is closed")]
    Closed,

    /// The reply channel could not be resolved after creation.
    #[error("Reply channel unavailable after {attempts} attempts")]
    ReplyChannelUnavailable { attempts: u32 },

    #[error("Invalid client options: {0}")]
    InvalidOptions(String),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),
}

impl ClientError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ClientError::Timeout { .. })
    }

    /// Status of a server-reported failure, if this is one.
    pub fn status(&self) -> Option<Status> {
        match self {
            ClientError::Response(response) => Some(response.status),
            _ => None,
        }
    }
}
