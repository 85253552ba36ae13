//! # CQ Telemetry
//!
//! Logging setup for command-queue binaries.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cq_telemetry::{init_logging, TelemetryConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&TelemetryConfig::from_env())?;
//!     // ...
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CQ_SERVICE_NAME` | `command-queue` | Service name in logs |
//! | `CQ_LOG_LEVEL` | `info` | Log filter, falls back to `RUST_LOG` |
//! | `CQ_JSON_LOGS` | `false` | JSON lines instead of text |
//! | `NO_COLOR` | unset | Disable ANSI colors |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::init_logging;

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TelemetryError {
    #[error("A global tracing subscriber is already installed")]
    AlreadyInitialized,

    #[error("Invalid log filter '{directive}': {reason}")]
    InvalidFilter { directive: String, reason: String },
}
