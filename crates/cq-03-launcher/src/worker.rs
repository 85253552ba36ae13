//! Worker side of the launcher protocol.
//!
//! A worker process runs one [`Processor`] and two small loops next to it:
//! one writes heartbeats to stdout, the other reads stop records from stdin.
//! Stdout belongs to the protocol, so worker logs must go to stderr.

use crate::config::{ENV_HEARTBEAT_MS, ENV_LAUNCHER_PID, ENV_WORKER_INDEX};
use crate::error::LauncherError;
use crate::protocol::{encode_heartbeat, parse_control, ControlRecord};
use cq_02_processor::{Processor, ProcessorHandle};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info, info_span, warn, Instrument};

const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);

/// Identity of a worker as assigned by its launcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerContext {
    pub index: usize,
    /// `None` when the worker was started by hand.
    pub launcher_pid: Option<u32>,
    pub heartbeat_interval: Duration,
}

impl WorkerContext {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            launcher_pid: None,
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }

    /// Read the context the launcher put in the environment.
    pub fn from_env() -> Result<Self, LauncherError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, LauncherError> {
        let index = lookup(ENV_WORKER_INDEX)
            .ok_or_else(|| LauncherError::WorkerEnv(format!("{ENV_WORKER_INDEX} is not set")))?
            .parse::<usize>()
            .map_err(|e| LauncherError::WorkerEnv(format!("{ENV_WORKER_INDEX}: {e}")))?;

        let launcher_pid = lookup(ENV_LAUNCHER_PID)
            .map(|pid| {
                pid.parse::<u32>()
                    .map_err(|e| LauncherError::WorkerEnv(format!("{ENV_LAUNCHER_PID}: {e}")))
            })
            .transpose()?;

        let heartbeat_interval = match lookup(ENV_HEARTBEAT_MS) {
            Some(ms) => {
                let ms = ms
                    .parse::<u64>()
                    .map_err(|e| LauncherError::WorkerEnv(format!("{ENV_HEARTBEAT_MS}: {e}")))?;
                if ms == 0 {
                    return Err(LauncherError::WorkerEnv(format!(
                        "{ENV_HEARTBEAT_MS} must be positive"
                    )));
                }
                Duration::from_millis(ms)
            }
            None => DEFAULT_HEARTBEAT_INTERVAL,
        };

        Ok(Self {
            index,
            launcher_pid,
            heartbeat_interval,
        })
    }

    /// Processor name of this worker.
    pub fn name(&self) -> String {
        format!("worker-{}", self.index)
    }
}

/// Whether the launcher that started us is still our parent.
fn launcher_alive(launcher_pid: Option<u32>) -> bool {
    match launcher_pid {
        #[cfg(unix)]
        Some(pid) => std::os::unix::process::parent_id() == pid,
        #[cfg(not(unix))]
        Some(_) => true,
        None => true,
    }
}

/// Emit heartbeats until the launcher is gone or the pipe breaks.
async fn heartbeat_loop<W>(ctx: WorkerContext, mut out: W, handle: ProcessorHandle)
where
    W: AsyncWrite + Unpin,
{
    let record = encode_heartbeat(ctx.index);
    let mut ticker = tokio::time::interval(ctx.heartbeat_interval);
    loop {
        ticker.tick().await;
        if !launcher_alive(ctx.launcher_pid) {
            warn!(worker = ctx.index, "Launcher is gone, stopping");
            handle.stop();
            return;
        }
        let written = async {
            out.write_all(record.as_bytes()).await?;
            out.flush().await
        }
        .await;
        if let Err(e) = written {
            warn!(worker = ctx.index, error = %e, "Heartbeat pipe broken, stopping");
            handle.stop();
            return;
        }
    }
}

/// Stop the processor on a stop record or when stdin closes.
async fn control_loop<R>(input: R, handle: ProcessorHandle)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(input).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => match parse_control(&line) {
                Ok(ControlRecord::Stop) => {
                    info!("Stop requested by launcher");
                    break;
                }
                Err(e) => debug!(error = %e, "Ignoring control record"),
            },
            Ok(None) => {
                info!("Control pipe closed");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Control pipe read failed");
                break;
            }
        }
    }
    handle.stop();
}

/// Run `processor` as launcher worker `ctx` until it is told to stop.
pub async fn run_worker(ctx: WorkerContext, processor: Processor) {
    run_worker_with_io(ctx, processor, tokio::io::stdin(), tokio::io::stdout()).await;
}

pub(crate) async fn run_worker_with_io<R, W>(
    ctx: WorkerContext,
    processor: Processor,
    input: R,
    output: W,
) where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let span = info_span!("worker", index = ctx.index);
    let handle = processor.handle();

    let heartbeat = tokio::spawn(
        heartbeat_loop(ctx.clone(), output, handle.clone()).instrument(span.clone()),
    );
    let control = tokio::spawn(control_loop(input, handle.clone()).instrument(span.clone()));

    async {
        info!(name = %handle.name(), "Worker started");
        processor.run().await;
        info!("Worker stopped");
    }
    .instrument(span)
    .await;

    heartbeat.abort();
    control.abort();
}
