//! Minimal launcher worker used to exercise supervision.
//!
//! ```text
//! cq-worker-probe            run a processor on a private in-memory queue
//! cq-worker-probe stall <n>  send <n> heartbeats, then go silent
//! ```
//!
//! Both modes read their identity from the launcher's environment.

use anyhow::{bail, Context, Result};
use cq_02_processor::{Processor, ProcessorConfig};
use cq_03_launcher::protocol::encode_heartbeat;
use cq_03_launcher::{run_worker, WorkerContext};
use cq_telemetry::{init_logging, TelemetryConfig};
use shared_queue::{InMemoryQueueService, QueueAttributes, QueueService, Tags};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_logging(&TelemetryConfig::from_env().for_service("cq-worker-probe"))?;
    let ctx = WorkerContext::from_env()?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None => healthy(ctx).await,
        Some("stall") => {
            let beats = args
                .get(1)
                .context("stall needs a heartbeat count")?
                .parse::<usize>()
                .context("invalid heartbeat count")?;
            stall(ctx, beats).await
        }
        Some(other) => bail!("unknown probe mode '{other}'"),
    }
}

async fn healthy(ctx: WorkerContext) -> Result<()> {
    let queue = Arc::new(InMemoryQueueService::new());
    queue
        .create_queue("probe", QueueAttributes::default(), Tags::new())
        .await?;
    let config = ProcessorConfig::builder("probe")
        .poll_wait(Duration::from_millis(200))
        .sync_command("Ping", |payload| Ok(payload))
        .build()?;
    let processor = Processor::with_name(config, queue, ctx.name()).await?;
    run_worker(ctx, processor).await;
    Ok(())
}

async fn stall(ctx: WorkerContext, beats: usize) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    for _ in 0..beats {
        stdout
            .write_all(encode_heartbeat(ctx.index).as_bytes())
            .await?;
        stdout.flush().await?;
        tokio::time::sleep(ctx.heartbeat_interval).await;
    }
    info!(worker = ctx.index, "Going silent");
    std::future::pending::<()>().await;
    Ok(())
}
