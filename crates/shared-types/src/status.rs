//! Reply status codes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Outcome class of a processed request, carried by every reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    /// The handler returned normally.
    Ok,
    /// The handler signalled a structured command failure.
    Error,
    /// The handler failed unexpectedly.
    ServiceError,
    /// No handler is registered under the requested name.
    CommandNotFound,
}

impl Status {
    /// Wire representation.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Error => "ERROR",
            Status::ServiceError => "SERVICE_ERROR",
            Status::CommandNotFound => "COMMAND_NOT_FOUND",
        }
    }

    pub const fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OK" => Ok(Status::Ok),
            "ERROR" => Ok(Status::Error),
            "SERVICE_ERROR" => Ok(Status::ServiceError),
            "COMMAND_NOT_FOUND" => Ok(Status::CommandNotFound),
            other => Err(other.to_string()),
        }
    }
}
