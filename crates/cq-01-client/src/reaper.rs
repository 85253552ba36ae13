//! # Reply Channel Reaper
//!
//! Clients that die without closing leave their reply channel behind. Every
//! live client renews the `cqmq:HeartbeatAt` tag of its channel, so a channel
//! whose tag is older than `max_idle` has been abandoned and can be deleted.

use shared_queue::{QueueError, QueueService};
use shared_types::{unix_now_secs, CLIENT_QUEUE_HEARTBEAT_TAG, CLIENT_QUEUE_NAME_PREFIX};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Default idle limit, matching the reply channel retention window.
pub const DEFAULT_MAX_IDLE: Duration = Duration::from_secs(600);

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub scanned: usize,
    pub reaped: usize,
    /// Channels without a readable heartbeat tag.
    pub skipped: usize,
}

pub struct ReplyChannelReaper {
    queue: Arc<dyn QueueService>,
    max_idle: Duration,
}

impl ReplyChannelReaper {
    pub fn new(queue: Arc<dyn QueueService>) -> Self {
        Self {
            queue,
            max_idle: DEFAULT_MAX_IDLE,
        }
    }

    #[must_use]
    pub fn with_max_idle(mut self, max_idle: Duration) -> Self {
        self.max_idle = max_idle;
        self
    }

    /// Delete abandoned reply channels as of now.
    pub async fn sweep(&self) -> Result<ReapReport, QueueError> {
        self.sweep_at(unix_now_secs()).await
    }

    /// Delete reply channels whose last heartbeat is older than `max_idle`
    /// relative to `now` (unix seconds).
    pub async fn sweep_at(&self, now: u64) -> Result<ReapReport, QueueError> {
        let mut report = ReapReport::default();
        for address in self.queue.list_queues(CLIENT_QUEUE_NAME_PREFIX).await? {
            report.scanned += 1;

            let tags = match self.queue.queue_tags(&address).await {
                Ok(tags) => tags,
                // Closed between listing and inspection.
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };
            let Some(heartbeat_at) = tags
                .get(CLIENT_QUEUE_HEARTBEAT_TAG)
                .and_then(|v| v.parse::<u64>().ok())
            else {
                report.skipped += 1;
                debug!(reply_channel = %address, "No heartbeat tag, leaving channel alone");
                continue;
            };

            let idle = now.saturating_sub(heartbeat_at);
            if idle > self.max_idle.as_secs() {
                self.queue.delete_queue(&address).await?;
                report.reaped += 1;
                info!(reply_channel = %address, idle_secs = idle, "Reaped abandoned reply channel");
            }
        }
        Ok(report)
    }

    /// Sweep every `interval` until `stop` flips to true or its sender drops.
    pub async fn run(self, interval: Duration, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.sweep().await {
                        Ok(report) if report.reaped > 0 => {
                            debug!(scanned = report.scanned, reaped = report.reaped, "Reaper sweep finished");
                        }
                        Ok(_) => {}
                        Err(e) => warn!(error = %e, "Reaper sweep failed"),
                    }
                }
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_queue::{InMemoryQueueService, QueueAttributes, Tags};

    async fn channel(memory: &InMemoryQueueService, name: &str, heartbeat: Option<&str>) {
        let mut tags = Tags::new();
        if let Some(at) = heartbeat {
            tags.insert(CLIENT_QUEUE_HEARTBEAT_TAG.into(), at.into());
        }
        memory
            .create_queue(name, QueueAttributes::default(), tags)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_sweep_removes_only_idle_channels() {
        let memory = Arc::new(InMemoryQueueService::new());
        channel(&memory, "cqmq-cl-old", Some("1000")).await;
        channel(&memory, "cqmq-cl-fresh", Some("1500")).await;
        channel(&memory, "cqmq-cl-untagged", None).await;
        channel(&memory, "work", Some("0")).await;

        let reaper = ReplyChannelReaper::new(memory.clone());
        let report = reaper.sweep_at(1_700).await.unwrap();

        assert_eq!(
            report,
            ReapReport {
                scanned: 3,
                reaped: 1,
                skipped: 1
            }
        );
        assert!(!memory.contains("cqmq-cl-old"));
        assert!(memory.contains("cqmq-cl-fresh"));
        assert!(memory.contains("cqmq-cl-untagged"));
        assert!(memory.contains("work"));
    }

    #[tokio::test]
    async fn test_live_client_survives_sweep() {
        let memory = Arc::new(InMemoryQueueService::new());
        channel(&memory, "work", None).await;
        let client = crate::Client::connect(memory.clone(), "work", Default::default())
            .await
            .unwrap();

        let report = ReplyChannelReaper::new(memory.clone())
            .with_max_idle(Duration::from_secs(60))
            .sweep()
            .await
            .unwrap();

        assert_eq!(report.reaped, 0);
        assert!(memory.contains(client.reply_channel_name()));
        client.close().await.unwrap();
    }
}
