//! # cq-runtime
//!
//! See the library docs for the subcommands.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};

use cq_01_client::{Client, ClientOptions, ReplyChannelReaper};
use cq_02_processor::{Processor, ProcessorConfig, ProcessorHandle};
use cq_03_launcher::{
    run_worker, spawn_signal_listener, Launcher, LauncherConfig, WorkerCommand, WorkerContext,
};
use cq_runtime::bench;
use cq_runtime::cli::{
    ClientArgs, Cli, Command, CreateQueueArgs, LauncherArgs, ReapArgs, WorkerArgs,
};
use cq_runtime::commands;
use cq_telemetry::{init_logging, TelemetryConfig};
use shared_queue::{QueueAttributes, QueueService, SpoolQueueService, Tags};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let service = match &cli.command {
        Command::Launcher(_) => "cq-launcher",
        Command::Worker(_) => "cq-worker",
        Command::Client(_) => "cq-client",
        Command::CreateQueue(_) | Command::Reap(_) => "cq-admin",
    };
    init_logging(&TelemetryConfig::from_env().for_service(service))?;

    match cli.command {
        Command::Launcher(args) => launcher(&cli.spool_dir, args).await,
        Command::Worker(args) => worker(&cli.spool_dir, args).await,
        Command::Client(args) => client(&cli.spool_dir, args).await,
        Command::CreateQueue(args) => create_queue(&cli.spool_dir, args).await,
        Command::Reap(args) => reap(&cli.spool_dir, args).await,
    }
}

async fn open_spool(dir: &Path) -> Result<Arc<SpoolQueueService>> {
    let spool = SpoolQueueService::open(dir)
        .await
        .with_context(|| format!("Failed to open spool directory {}", dir.display()))?;
    Ok(Arc::new(spool))
}

async fn launcher(spool_dir: &Path, args: LauncherArgs) -> Result<()> {
    // Workers fail fast on a missing queue; make sure it is there first.
    let spool = open_spool(spool_dir).await?;
    spool
        .create_queue(&args.queue.queue, QueueAttributes::default(), Tags::new())
        .await
        .context("Failed to create work queue")?;

    let program = std::env::current_exe().context("Failed to locate cq-runtime executable")?;
    let worker = WorkerCommand::new(program)
        .arg("worker")
        .arg("--queue")
        .arg(args.queue.queue.clone())
        .arg("--pool-size")
        .arg(args.pool_size.to_string())
        .env("CQ_SPOOL_DIR", spool.root().display().to_string());

    let mut config = LauncherConfig::new(worker);
    config.workers = args.workers;
    config.heartbeat_interval = args.heartbeat_interval();
    config.stale_after = args.stale_after();

    let launcher = Launcher::new(config)?;
    spawn_signal_listener(launcher.handle());
    info!(queue = %args.queue.queue, workers = args.workers, "Launcher starting");
    launcher.run().await?;
    Ok(())
}

async fn worker(spool_dir: &Path, args: WorkerArgs) -> Result<()> {
    let spool = open_spool(spool_dir).await?;
    let config = commands::register(ProcessorConfig::builder(args.queue.queue.clone()))
        .pool_size(args.pool_size)
        .poll_wait(Duration::from_secs(args.poll_wait_secs))
        .build()?;

    match WorkerContext::from_env() {
        Ok(ctx) => {
            let processor = Processor::with_name(config, spool, ctx.name()).await?;
            stop_on_signal(processor.handle());
            run_worker(ctx, processor).await;
        }
        Err(_) => {
            // Started by hand rather than by a launcher.
            let processor = Processor::new(config, spool).await?;
            stop_on_signal(processor.handle());
            processor.run().await;
        }
    }
    Ok(())
}

/// First INT/TERM stops the processor gracefully.
fn stop_on_signal(handle: ProcessorHandle) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {}
                        _ = sigterm.recv() => {}
                    }
                }
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGTERM handler");
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        }
        #[cfg(not(unix))]
        let _ = tokio::signal::ctrl_c().await;

        info!("Shutdown signal received");
        handle.stop();
    });
}

async fn client(spool_dir: &Path, args: ClientArgs) -> Result<()> {
    let spool = open_spool(spool_dir).await?;
    let client = Client::connect(spool, &args.queue.queue, ClientOptions::default())
        .await
        .with_context(|| format!("Failed to connect to queue {}", args.queue.queue))?;

    let report = bench::run(
        &client,
        args.requests,
        Duration::from_secs(args.timeout_secs),
    )
    .await;
    client.close().await?;

    println!(
        "{} requests in {:.2?}: {} ok, {} failed, {} timed out ({:.1} req/s)",
        args.requests,
        report.elapsed,
        report.ok,
        report.failed,
        report.timeouts,
        report.requests_per_sec()
    );
    if let Some(latency) = report.latency {
        println!(
            "latency min {:.2?}  mean {:.2?}  p50 {:.2?}  p99 {:.2?}  max {:.2?}",
            latency.min, latency.mean, latency.p50, latency.p99, latency.max
        );
    }
    Ok(())
}

async fn create_queue(spool_dir: &Path, args: CreateQueueArgs) -> Result<()> {
    let spool = open_spool(spool_dir).await?;
    let attributes = QueueAttributes {
        retention: args.retention_secs.map(Duration::from_secs),
        receive_wait: None,
    };
    let address = spool
        .create_queue(&args.queue.queue, attributes, Tags::new())
        .await?;
    println!("{address}");
    Ok(())
}

async fn reap(spool_dir: &Path, args: ReapArgs) -> Result<()> {
    let spool = open_spool(spool_dir).await?;
    let report = ReplyChannelReaper::new(spool)
        .with_max_idle(Duration::from_secs(args.max_idle_secs))
        .sweep()
        .await?;
    println!(
        "scanned {}, reaped {}, skipped {}",
        report.scanned, report.reaped, report.skipped
    );
    Ok(())
}
