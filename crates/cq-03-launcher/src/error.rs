//! Launcher error types.

use thiserror::Error;

/// Malformed record on a liveness or control channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("Empty record")]
    Empty,

    #[error("Unknown record tag '{0}'")]
    UnknownTag(char),

    #[error("Invalid worker index in record '{0}'")]
    InvalidIndex(String),
}

#[derive(Debug, Error)]
pub enum LauncherError {
    #[error("Invalid launcher configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to spawn worker #{index}: {source}")]
    Spawn {
        index: usize,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker #{index} has no {pipe} pipe")]
    MissingPipe { index: usize, pipe: &'static str },

    #[error("Invalid worker environment: {0}")]
    WorkerEnv(String),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
