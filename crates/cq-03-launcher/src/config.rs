//! Launcher configuration.

use crate::error::LauncherError;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable carrying the worker's stable index.
pub const ENV_WORKER_INDEX: &str = "CQ_WORKER_INDEX";
/// Environment variable carrying the launcher's process id.
pub const ENV_LAUNCHER_PID: &str = "CQ_LAUNCHER_PID";
/// Environment variable carrying the heartbeat interval in milliseconds.
pub const ENV_HEARTBEAT_MS: &str = "CQ_HEARTBEAT_MS";

/// How to start one worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

impl WorkerCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct LauncherConfig {
    /// Number of worker processes, indexed `0..workers`.
    pub workers: usize,
    /// Interval at which workers emit heartbeats.
    pub heartbeat_interval: Duration,
    /// A worker silent for longer than this is killed and respawned.
    pub stale_after: Duration,
    /// Interval of the staleness scan.
    pub scan_interval: Duration,
    /// Bounded wait of one health-check multiplexed read.
    pub health_wait: Duration,
    /// How long stopping workers may take before they are killed.
    pub shutdown_grace: Duration,
    pub worker: WorkerCommand,
}

impl LauncherConfig {
    pub fn new(worker: WorkerCommand) -> Self {
        Self {
            workers: 1,
            heartbeat_interval: Duration::from_secs(5),
            stale_after: Duration::from_secs(30),
            scan_interval: Duration::from_secs(5),
            health_wait: Duration::from_secs(5),
            shutdown_grace: Duration::from_secs(60),
            worker,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), LauncherError> {
        if self.workers == 0 {
            return Err(LauncherError::InvalidConfig(
                "at least one worker is required".into(),
            ));
        }
        for (name, value) in [
            ("heartbeat_interval", self.heartbeat_interval),
            ("stale_after", self.stale_after),
            ("scan_interval", self.scan_interval),
            ("health_wait", self.health_wait),
        ] {
            if value.is_zero() {
                return Err(LauncherError::InvalidConfig(format!("{name} must be positive")));
            }
        }
        if self.stale_after <= self.heartbeat_interval {
            return Err(LauncherError::InvalidConfig(format!(
                "stale_after ({:?}) must exceed heartbeat_interval ({:?})",
                self.stale_after, self.heartbeat_interval
            )));
        }
        Ok(())
    }
}
