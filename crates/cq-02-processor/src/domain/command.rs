//! Command outcomes and their mapping onto reply statuses.

use serde_json::json;
use shared_types::{Payload, Status};
use thiserror::Error;

/// Fixed payload of a `COMMAND_NOT_FOUND` reply.
pub fn command_not_found_payload() -> Payload {
    json!({ "error": "Command not found" })
}

/// Failure raised by a command handler.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    /// Structured failure the caller is expected to handle (`ERROR`).
    #[error("{message}")]
    Failure { message: String, detail: Payload },

    /// Anything else (`SERVICE_ERROR`). Only the message reaches the caller.
    #[error("{message}")]
    Unexpected { message: String },
}

impl CommandError {
    pub fn failure(message: impl Into<String>, detail: Payload) -> Self {
        CommandError::Failure {
            message: message.into(),
            detail,
        }
    }

    pub fn unexpected(message: impl Into<String>) -> Self {
        CommandError::Unexpected {
            message: message.into(),
        }
    }
}

/// Lets handlers use `?` on arbitrary errors. A `CommandError` that travelled
/// inside an `anyhow::Error` keeps its kind.
impl From<anyhow::Error> for CommandError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<CommandError>() {
            Ok(command_error) => command_error,
            Err(other) => CommandError::Unexpected {
                message: other.to_string(),
            },
        }
    }
}

/// Return type of every command handler.
pub type CommandResult = Result<Payload, CommandError>;

/// What the dispatcher decided for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    Ok(Payload),
    CommandNotFound,
    Failure { message: String, detail: Payload },
    Unexpected { message: String },
}

impl DispatchOutcome {
    pub fn status(&self) -> Status {
        match self {
            DispatchOutcome::Ok(_) => Status::Ok,
            DispatchOutcome::CommandNotFound => Status::CommandNotFound,
            DispatchOutcome::Failure { .. } => Status::Error,
            DispatchOutcome::Unexpected { .. } => Status::ServiceError,
        }
    }

    /// Reply body sent back to the caller.
    pub fn into_reply_payload(self) -> Payload {
        match self {
            DispatchOutcome::Ok(payload) => payload,
            DispatchOutcome::CommandNotFound => command_not_found_payload(),
            DispatchOutcome::Failure { message, detail } => {
                json!({ "error": message, "data": detail })
            }
            DispatchOutcome::Unexpected { message } => json!({ "error": message }),
        }
    }
}

impl From<CommandResult> for DispatchOutcome {
    fn from(result: CommandResult) -> Self {
        match result {
            Ok(payload) => DispatchOutcome::Ok(payload),
            Err(CommandError::Failure { message, detail }) => {
                DispatchOutcome::Failure { message, detail }
            }
            Err(CommandError::Unexpected { message }) => DispatchOutcome::Unexpected { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_reply_carries_detail() {
        let outcome = DispatchOutcome::from(Err(CommandError::failure(
            "Missing required parameter 'item_id'",
            json!({"parameter_name": "item_id"}),
        )));
        assert_eq!(outcome.status(), Status::Error);
        assert_eq!(
            outcome.into_reply_payload(),
            json!({
                "error": "Missing required parameter 'item_id'",
                "data": {"parameter_name": "item_id"}
            })
        );
    }

    #[test]
    fn test_unexpected_reply_omits_detail() {
        let outcome = DispatchOutcome::from(Err(CommandError::unexpected("argument error: 7")));
        assert_eq!(outcome.status(), Status::ServiceError);
        assert_eq!(
            outcome.into_reply_payload(),
            json!({"error": "argument error: 7"})
        );
    }

    #[test]
    fn test_not_found_payload_is_fixed() {
        let outcome = DispatchOutcome::CommandNotFound;
        assert_eq!(outcome.status(), Status::CommandNotFound);
        assert_eq!(
            outcome.into_reply_payload(),
            json!({"error": "Command not found"})
        );
    }

    #[test]
    fn test_anyhow_conversion_preserves_command_errors() {
        let wrapped = anyhow::Error::new(CommandError::failure("bad", json!(1)));
        assert!(matches!(
            CommandError::from(wrapped),
            CommandError::Failure { .. }
        ));

        let plain = anyhow::anyhow!("disk on fire");
        assert_eq!(
            CommandError::from(plain),
            CommandError::unexpected("disk on fire")
        );
    }
}
