//! Command line interface.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Command queue runtime
#[derive(Parser, Debug)]
#[command(name = "cq-runtime", version)]
#[command(about = "Run command-queue workers, launchers and clients over a spool directory")]
pub struct Cli {
    /// Spool directory shared by every process on this host
    #[arg(long, env = "CQ_SPOOL_DIR", default_value = "./cq-spool", global = true)]
    pub spool_dir: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Supervise a pool of worker processes
    Launcher(LauncherArgs),
    /// Serve the demo commands from the work queue
    Worker(WorkerArgs),
    /// Benchmark request/reply latency with Ping calls
    Client(ClientArgs),
    /// Create a queue (no-op if it exists)
    CreateQueue(CreateQueueArgs),
    /// Delete abandoned client reply channels
    Reap(ReapArgs),
}

#[derive(Args, Debug, Clone)]
pub struct QueueArgs {
    /// Work queue name
    #[arg(short, long, env = "CQ_QUEUE", default_value = "cq-work")]
    pub queue: String,
}

#[derive(Args, Debug)]
pub struct LauncherArgs {
    #[command(flatten)]
    pub queue: QueueArgs,

    /// Number of worker processes
    #[arg(short, long, env = "CQ_WORKERS", default_value = "1")]
    pub workers: usize,

    /// Concurrent commands per worker
    #[arg(long, env = "CQ_POOL_SIZE", default_value = "4")]
    pub pool_size: usize,

    /// Worker heartbeat interval in seconds
    #[arg(long, default_value = "5")]
    pub heartbeat_secs: u64,

    /// Seconds without heartbeat before a worker is replaced
    #[arg(long, default_value = "30")]
    pub stale_secs: u64,
}

#[derive(Args, Debug)]
pub struct WorkerArgs {
    #[command(flatten)]
    pub queue: QueueArgs,

    /// Concurrent commands
    #[arg(long, env = "CQ_POOL_SIZE", default_value = "4")]
    pub pool_size: usize,

    /// Long-poll wait in seconds
    #[arg(long, default_value = "20")]
    pub poll_wait_secs: u64,
}

#[derive(Args, Debug)]
pub struct ClientArgs {
    #[command(flatten)]
    pub queue: QueueArgs,

    /// Number of Ping requests
    #[arg(short = 'n', long, default_value = "100")]
    pub requests: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "10")]
    pub timeout_secs: u64,
}

#[derive(Args, Debug)]
pub struct CreateQueueArgs {
    #[command(flatten)]
    pub queue: QueueArgs,

    /// Drop unreceived messages after this many seconds
    #[arg(long)]
    pub retention_secs: Option<u64>,
}

#[derive(Args, Debug)]
pub struct ReapArgs {
    /// Reply channels idle longer than this are deleted
    #[arg(long, default_value = "600")]
    pub max_idle_secs: u64,
}

impl LauncherArgs {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_launcher_args() {
        let cli = Cli::try_parse_from([
            "cq-runtime",
            "launcher",
            "--queue",
            "orders",
            "--workers",
            "3",
            "--spool-dir",
            "/tmp/spool",
        ])
        .unwrap();
        assert_eq!(cli.spool_dir, PathBuf::from("/tmp/spool"));
        match cli.command {
            Command::Launcher(args) => {
                assert_eq!(args.queue.queue, "orders");
                assert_eq!(args.workers, 3);
                assert_eq!(args.stale_after(), Duration::from_secs(30));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_client_defaults() {
        let cli = Cli::try_parse_from(["cq-runtime", "client", "-n", "5"]).unwrap();
        match cli.command {
            Command::Client(args) => {
                assert_eq!(args.requests, 5);
                assert_eq!(args.timeout_secs, 10);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
