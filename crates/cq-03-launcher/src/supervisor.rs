//! # Launcher Supervisor
//!
//! ```text
//!                ┌──────────────┐ stdout "H$i" ┌──────────────────┐
//!  worker #0 ───→│              │─────────────→│ health-check task│──→ heartbeat board
//!  worker #1 ───→│  StreamMap   │   bounded    │ (multiplexed     │        │
//!  worker #2 ───→│              │   wait       │  line reader)    │        │
//!                └──────────────┘              └──────────────────┘        │
//!                                                                          ▼
//!                                     control loop: every scan_interval, kill and
//!                                     respawn any index silent for > stale_after
//! ```
//!
//! The launcher never looks at why a worker failed. A worker that crashed,
//! hung or lost its pipe looks the same: its heartbeat stops.

use crate::config::{
    LauncherConfig, ENV_HEARTBEAT_MS, ENV_LAUNCHER_PID, ENV_WORKER_INDEX,
};
use crate::error::LauncherError;
use crate::metrics;
use crate::protocol::{encode_stop, parse_liveness, LivenessRecord};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::wrappers::LinesStream;
use tokio_stream::{StreamExt, StreamMap};
use tracing::{debug, error, info, trace, warn};

/// Launcher counters
#[derive(Debug, Default)]
pub struct LauncherStats {
    /// Worker processes started (initial and respawned)
    pub spawned: AtomicU64,
    /// Workers killed for a stale heartbeat and started again
    pub respawns: AtomicU64,
    /// Heartbeat records received
    pub heartbeats: AtomicU64,
}

impl LauncherStats {
    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Point-in-time view of one worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSnapshot {
    pub index: usize,
    pub pid: Option<u32>,
    /// Time since the last heartbeat, or since spawn before the first one.
    pub heartbeat_age: Duration,
    /// Heartbeats received from this process.
    pub heartbeats: u64,
    pub spawned_at: SystemTime,
}

/// Result of a stop request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopRequest {
    /// First request: workers are being stopped gracefully.
    Graceful,
    /// A stop was already in progress; the caller should terminate at once.
    Escalated,
}

#[derive(Debug, Clone, Copy)]
struct WorkerInfo {
    pid: Option<u32>,
    heartbeats: u64,
    spawned_at: SystemTime,
}

struct Shared {
    stopping: AtomicBool,
    stop_tx: watch::Sender<bool>,
    /// Last heartbeat per worker index.
    board: Mutex<HashMap<usize, Instant>>,
    workers: Mutex<BTreeMap<usize, WorkerInfo>>,
    stats: LauncherStats,
}

/// Cloneable control of a running launcher.
#[derive(Clone)]
pub struct LauncherHandle {
    shared: Arc<Shared>,
}

impl LauncherHandle {
    /// Ask the launcher to stop its workers and return.
    ///
    /// A second request while already stopping returns
    /// [`StopRequest::Escalated`].
    pub fn request_stop(&self) -> StopRequest {
        if self.shared.stopping.swap(true, Ordering::SeqCst) {
            warn!("Launcher stop requested again while stopping");
            return StopRequest::Escalated;
        }
        info!("Launcher stopping requested");
        self.shared.stop_tx.send_replace(true);
        StopRequest::Graceful
    }

    pub fn is_stopping(&self) -> bool {
        self.shared.stopping.load(Ordering::SeqCst)
    }

    /// Current workers, ordered by index.
    pub fn snapshot(&self) -> Vec<WorkerSnapshot> {
        let now = Instant::now();
        let board = self.shared.board.lock();
        self.shared
            .workers
            .lock()
            .iter()
            .map(|(&index, info)| WorkerSnapshot {
                index,
                pid: info.pid,
                heartbeat_age: board
                    .get(&index)
                    .map(|at| now.saturating_duration_since(*at))
                    .unwrap_or_default(),
                heartbeats: info.heartbeats,
                spawned_at: info.spawned_at,
            })
            .collect()
    }

    pub fn stats(&self) -> &LauncherStats {
        &self.shared.stats
    }
}

struct WorkerSlot {
    index: usize,
    child: Child,
    stdin: Option<ChildStdin>,
}

/// Supervisor of a fixed pool of worker processes.
pub struct Launcher {
    config: LauncherConfig,
    shared: Arc<Shared>,
}

impl Launcher {
    pub fn new(config: LauncherConfig) -> Result<Self, LauncherError> {
        config.validate()?;
        let (stop_tx, _) = watch::channel(false);
        Ok(Self {
            config,
            shared: Arc::new(Shared {
                stopping: AtomicBool::new(false),
                stop_tx,
                board: Mutex::new(HashMap::new()),
                workers: Mutex::new(BTreeMap::new()),
                stats: LauncherStats::default(),
            }),
        })
    }

    pub fn handle(&self) -> LauncherHandle {
        LauncherHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Spawn the pool, supervise it until a stop is requested, then stop
    /// every worker.
    ///
    /// Fails only if the initial pool cannot be spawned.
    pub async fn run(self) -> Result<(), LauncherError> {
        let (register_tx, register_rx) = mpsc::unbounded_channel();
        let health = tokio::spawn(health_check(
            register_rx,
            Arc::clone(&self.shared),
            self.config.health_wait,
        ));

        info!(workers = self.config.workers, "Spawning worker(s)...");
        let mut slots = BTreeMap::new();
        for index in 0..self.config.workers {
            let slot = self.spawn_worker(index, &register_tx)?;
            slots.insert(index, slot);
        }

        let mut stop_rx = self.shared.stop_tx.subscribe();
        let mut scan = tokio::time::interval(self.config.scan_interval);
        scan.set_missed_tick_behavior(MissedTickBehavior::Delay);
        scan.tick().await;

        loop {
            tokio::select! {
                _ = stop_requested(&mut stop_rx) => break,
                _ = scan.tick() => {}
            }
            if self.shared.stopping.load(Ordering::SeqCst) {
                break;
            }
            for index in self.stale_workers() {
                self.respawn(index, &mut slots, &register_tx).await;
            }
        }

        health.abort();
        self.shutdown(slots).await;
        info!("Launcher stopped");
        Ok(())
    }

    fn stale_workers(&self) -> Vec<usize> {
        let now = Instant::now();
        self.shared
            .board
            .lock()
            .iter()
            .filter(|(_, at)| now.saturating_duration_since(**at) > self.config.stale_after)
            .map(|(index, _)| *index)
            .collect()
    }

    async fn respawn(
        &self,
        index: usize,
        slots: &mut BTreeMap<usize, WorkerSlot>,
        register_tx: &mpsc::UnboundedSender<(usize, ChildStdout)>,
    ) {
        if let Some(mut old) = slots.remove(&index) {
            warn!(
                worker = index,
                pid = ?old.child.id(),
                "Worker heartbeat is stale, killing"
            );
            if let Err(e) = old.child.kill().await {
                debug!(worker = index, error = %e, "Kill failed (already exited?)");
            }
        }

        match self.spawn_worker(index, register_tx) {
            Ok(slot) => {
                slots.insert(index, slot);
                LauncherStats::incr(&self.shared.stats.respawns);
                metrics::record_respawn();
                info!(worker = index, "Worker respawned");
            }
            Err(e) => {
                error!(worker = index, error = %e, "Failed to respawn worker, retrying next scan");
                // Leave it stale so the next scan tries again.
                let retry_at = Instant::now()
                    .checked_sub(self.config.stale_after + Duration::from_millis(1))
                    .unwrap_or_else(Instant::now);
                self.shared.board.lock().insert(index, retry_at);
                self.shared.workers.lock().remove(&index);
            }
        }
    }

    fn spawn_worker(
        &self,
        index: usize,
        register_tx: &mpsc::UnboundedSender<(usize, ChildStdout)>,
    ) -> Result<WorkerSlot, LauncherError> {
        let worker = &self.config.worker;
        debug!(worker = index, program = %worker.program.display(), "Starting worker...");

        let mut command = Command::new(&worker.program);
        command
            .args(&worker.args)
            .envs(worker.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .env(ENV_WORKER_INDEX, index.to_string())
            .env(ENV_LAUNCHER_PID, std::process::id().to_string())
            .env(
                ENV_HEARTBEAT_MS,
                self.config.heartbeat_interval.as_millis().to_string(),
            )
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.arg0(format!("cq-worker #{index}"));

        let mut child = command
            .spawn()
            .map_err(|source| LauncherError::Spawn { index, source })?;
        let stdout = child.stdout.take().ok_or(LauncherError::MissingPipe {
            index,
            pipe: "stdout",
        })?;
        let stdin = child.stdin.take();

        // Fresh process, fresh heartbeat.
        self.shared.board.lock().insert(index, Instant::now());
        self.shared.workers.lock().insert(
            index,
            WorkerInfo {
                pid: child.id(),
                heartbeats: 0,
                spawned_at: SystemTime::now(),
            },
        );
        if register_tx.send((index, stdout)).is_err() {
            warn!(worker = index, "Health check task is gone");
        }

        LauncherStats::incr(&self.shared.stats.spawned);
        metrics::set_workers_alive(self.shared.workers.lock().len() as i64);
        info!(worker = index, pid = ?child.id(), "Worker started");

        Ok(WorkerSlot {
            index,
            child,
            stdin,
        })
    }

    /// Ask every worker to stop, wait up to `shutdown_grace`, kill stragglers.
    async fn shutdown(&self, mut slots: BTreeMap<usize, WorkerSlot>) {
        for slot in slots.values_mut() {
            debug!(worker = slot.index, pid = ?slot.child.id(), "Terminating worker...");
            if let Some(mut stdin) = slot.stdin.take() {
                if let Err(e) = stdin.write_all(encode_stop().as_bytes()).await {
                    debug!(worker = slot.index, error = %e, "Could not send stop record");
                }
                // Dropping stdin closes the pipe; EOF is a stop request too.
            }
        }

        let deadline = Instant::now() + self.config.shutdown_grace;
        for mut slot in slots.into_values() {
            match tokio::time::timeout_at(deadline, slot.child.wait()).await {
                Ok(Ok(status)) => {
                    debug!(worker = slot.index, status = %status, "Worker exited");
                }
                Ok(Err(e)) => {
                    warn!(worker = slot.index, error = %e, "Failed to wait for worker");
                }
                Err(_) => {
                    warn!(worker = slot.index, "Worker did not stop in time, killing");
                    if let Err(e) = slot.child.kill().await {
                        debug!(worker = slot.index, error = %e, "Kill failed");
                    }
                }
            }
            self.shared.workers.lock().remove(&slot.index);
        }
        metrics::set_workers_alive(0);
    }
}

/// Resolves once a stop was requested.
async fn stop_requested(stop_rx: &mut watch::Receiver<bool>) {
    loop {
        if *stop_rx.borrow_and_update() {
            return;
        }
        if stop_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

type WorkerLines = LinesStream<BufReader<ChildStdout>>;

/// Multiplex every worker's stdout and record heartbeats.
async fn health_check(
    mut register_rx: mpsc::UnboundedReceiver<(usize, ChildStdout)>,
    shared: Arc<Shared>,
    health_wait: Duration,
) {
    let mut streams: StreamMap<usize, WorkerLines> = StreamMap::new();

    loop {
        if streams.is_empty() {
            match register_rx.recv().await {
                Some((index, stdout)) => {
                    streams.insert(index, LinesStream::new(BufReader::new(stdout).lines()));
                    continue;
                }
                None => break,
            }
        }

        tokio::select! {
            registered = register_rx.recv() => match registered {
                // A respawn replaces the previous stream of that index.
                Some((index, stdout)) => {
                    streams.insert(index, LinesStream::new(BufReader::new(stdout).lines()));
                }
                None => break,
            },
            next = tokio::time::timeout(health_wait, streams.next()) => match next {
                Err(_) | Ok(None) => {}
                Ok(Some((index, Ok(line)))) => record_heartbeat(&shared, index, &line),
                Ok(Some((index, Err(e)))) => {
                    warn!(worker = index, error = %e, "Worker pipe read failed");
                    streams.remove(&index);
                }
            },
        }
    }
    debug!("Health check task stopped");
}

fn record_heartbeat(shared: &Shared, index: usize, line: &str) {
    match parse_liveness(line) {
        Ok(LivenessRecord::Heartbeat { index: reported }) if reported == index => {
            shared.board.lock().insert(index, Instant::now());
            if let Some(info) = shared.workers.lock().get_mut(&index) {
                info.heartbeats += 1;
            }
            LauncherStats::incr(&shared.stats.heartbeats);
            metrics::record_heartbeat();
            trace!(worker = index, "Received heartbeat");
        }
        Ok(LivenessRecord::Heartbeat { index: reported }) => {
            warn!(worker = index, reported = reported, "Heartbeat index does not match pipe");
        }
        Err(e) => {
            debug!(worker = index, error = %e, line = line, "Ignoring unexpected worker output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WorkerCommand;

    fn shared() -> Arc<Shared> {
        let (stop_tx, _) = watch::channel(false);
        Arc::new(Shared {
            stopping: AtomicBool::new(false),
            stop_tx,
            board: Mutex::new(HashMap::new()),
            workers: Mutex::new(BTreeMap::new()),
            stats: LauncherStats::default(),
        })
    }

    #[test]
    fn test_record_heartbeat_updates_board() {
        let shared = shared();
        shared.workers.lock().insert(
            1,
            WorkerInfo {
                pid: None,
                heartbeats: 0,
                spawned_at: SystemTime::now(),
            },
        );
        record_heartbeat(&shared, 1, "H$1");
        record_heartbeat(&shared, 1, "H$1");
        assert!(shared.board.lock().contains_key(&1));
        assert_eq!(shared.workers.lock()[&1].heartbeats, 2);
        assert_eq!(LauncherStats::get(&shared.stats.heartbeats), 2);
    }

    #[test]
    fn test_mismatched_or_garbage_lines_are_ignored() {
        let shared = shared();
        record_heartbeat(&shared, 1, "H$2");
        record_heartbeat(&shared, 1, "hello from a print statement");
        assert!(shared.board.lock().is_empty());
    }

    #[test]
    fn test_second_stop_request_escalates() {
        let launcher =
            Launcher::new(LauncherConfig::new(WorkerCommand::new("/bin/true"))).unwrap();
        let handle = launcher.handle();
        assert_eq!(handle.request_stop(), StopRequest::Graceful);
        assert!(handle.is_stopping());
        assert_eq!(handle.request_stop(), StopRequest::Escalated);
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let mut config = LauncherConfig::new(WorkerCommand::new("/nonexistent/cq-worker"));
        config.workers = 2;
        let err = Launcher::new(config).unwrap().run().await.unwrap_err();
        assert!(matches!(err, LauncherError::Spawn { index: 0, .. }));
    }
}
