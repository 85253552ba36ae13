//! Demo commands served by `cq-runtime worker`.

use cq_02_processor::{CommandError, CommandResult, ProcessorConfigBuilder};
use serde_json::json;
use shared_types::Payload;
use std::time::{SystemTime, UNIX_EPOCH};

/// Item id that makes `Ping` fail unexpectedly, for exercising
/// `SERVICE_ERROR` replies.
pub const FAULTY_ITEM_ID: i64 = 7;

/// `Ping {item_id}` replies `{item_id, pong: <unix seconds>}`.
pub fn ping(payload: Payload) -> CommandResult {
    let item_id = match payload.get("item_id") {
        Some(id) if !id.is_null() => id.clone(),
        _ => {
            return Err(CommandError::failure(
                "Missing required parameter 'item_id'",
                json!({ "parameter_name": "item_id" }),
            ))
        }
    };

    if item_id.as_i64() == Some(FAULTY_ITEM_ID) {
        return Err(CommandError::unexpected(format!(
            "Item {FAULTY_ITEM_ID} cannot be processed"
        )));
    }

    let pong = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default();
    Ok(json!({ "item_id": item_id, "pong": pong }))
}

/// Register every demo command.
pub fn register(builder: ProcessorConfigBuilder) -> ProcessorConfigBuilder {
    builder.sync_command("Ping", ping)
}
