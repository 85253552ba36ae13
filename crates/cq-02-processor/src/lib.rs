//! # CQ-02 Processor
//!
//! Server side of the command queue. A processor long-polls the work queue,
//! hands each request to a bounded pool, runs the registered handler and
//! sends a status-tagged reply to the request's reply channel.
//!
//! ## Reply statuses
//!
//! | Handler outcome                    | Status              | Payload                         |
//! |------------------------------------|---------------------|---------------------------------|
//! | `Ok(payload)`                      | `OK`                | `payload`                       |
//! | `Err(CommandError::Failure)`       | `ERROR`             | `{"error": msg, "data": detail}`|
//! | `Err(CommandError::Unexpected)`    | `SERVICE_ERROR`     | `{"error": msg}`                |
//! | handler panicked                   | `SERVICE_ERROR`     | `{"error": panic msg}`          |
//! | no handler for the command         | `COMMAND_NOT_FOUND` | `{"error": "Command not found"}`|
//!
//! The request is deleted from the work queue after the reply attempt,
//! whether or not the reply could be delivered. Handlers must therefore
//! tolerate both replays (visibility timeout) and lost replies.
//!
//! ## Usage
//!
//! ```ignore
//! let config = ProcessorConfig::builder("orders")
//!     .sync_command("Ping", |args| Ok(json!({"pong": true})))
//!     .build()?;
//! let processor = Processor::new(config, queue).await?;
//! let handle = processor.handle();
//! tokio::spawn(async move { signal::ctrl_c().await.ok(); handle.stop(); });
//! processor.run().await;
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod error;
pub mod metrics;
pub mod service;
pub mod state;

pub use domain::{
    command_not_found_payload, AsyncFnHandler, CommandError, CommandHandler, CommandRegistry,
    CommandResult, DispatchOutcome, FnHandler, ProcessorConfig, ProcessorConfigBuilder,
    ProcessorStats,
};
pub use error::{ConfigError, ProcessorError};
pub use service::{Processor, ProcessorHandle, ProcessorNotice};
pub use state::ProcessorState;

/// Message of a panicked (or cancelled) handler task.
pub(crate) fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return "command handler was cancelled".to_string();
    }
    let panic = err.into_panic();
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "command handler panicked".to_string()
    }
}
