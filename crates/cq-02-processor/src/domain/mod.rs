//! Processor domain: handler contract, registry, outcomes, configuration.

pub mod command;
pub mod config;
pub mod handler;
pub mod registry;
pub mod stats;

pub use command::{command_not_found_payload, CommandError, CommandResult, DispatchOutcome};
pub use config::{ProcessorConfig, ProcessorConfigBuilder};
pub use handler::{AsyncFnHandler, CommandHandler, FnHandler};
pub use registry::CommandRegistry;
pub use stats::ProcessorStats;
