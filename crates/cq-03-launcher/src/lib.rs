//! # CQ-03 Launcher
//!
//! Runs a fixed number of processor workers as child processes and keeps
//! them alive.
//!
//! Every worker gets a stable index `0..workers`, passed through the
//! environment together with the launcher's pid. Workers write a heartbeat
//! record to their stdout pipe every `heartbeat_interval`; the launcher
//! multiplexes all pipes in a single health-check task and kills and
//! respawns, under the same index, any worker that has been silent for
//! longer than `stale_after`.
//!
//! Stopping writes a stop record to every worker's stdin and waits for them
//! to drain. A second stop request terminates the launcher immediately.
//!
//! A worker whose launcher disappears stops on its own.
//!
//! ## Usage
//!
//! ```ignore
//! // launcher process
//! let worker = WorkerCommand::new(std::env::current_exe()?).arg("worker");
//! let mut config = LauncherConfig::new(worker);
//! config.workers = 4;
//! let launcher = Launcher::new(config)?;
//! spawn_signal_listener(launcher.handle());
//! launcher.run().await?;
//!
//! // worker process
//! let ctx = WorkerContext::from_env()?;
//! let processor = Processor::with_name(config, queue, ctx.name()).await?;
//! run_worker(ctx, processor).await;
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod signals;
pub mod supervisor;
pub mod worker;

pub use config::{LauncherConfig, WorkerCommand};
pub use error::{LauncherError, ProtocolError};
pub use signals::{spawn_signal_listener, ESCALATED_EXIT_CODE};
pub use supervisor::{Launcher, LauncherHandle, LauncherStats, StopRequest, WorkerSnapshot};
pub use worker::{run_worker, WorkerContext};
