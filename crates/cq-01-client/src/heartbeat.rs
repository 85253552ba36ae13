//! Reply channel heartbeat.
//!
//! Re-tags the reply channel with the current unix time after every jittered
//! interval so a reaper can tell live channels from abandoned ones. Failures
//! are logged and retried after a short pause; they never reach the caller.

use crate::domain::{ClientOptions, ClientStats};
use shared_queue::{QueueAddress, QueueService, Tags};
use shared_types::{unix_now_secs, CLIENT_QUEUE_HEARTBEAT_TAG};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Tags announcing a heartbeat at the current time.
pub fn heartbeat_tags() -> Tags {
    let mut tags = Tags::new();
    tags.insert(
        CLIENT_QUEUE_HEARTBEAT_TAG.to_string(),
        unix_now_secs().to_string(),
    );
    tags
}

pub(crate) fn spawn_heartbeat(
    queue: Arc<dyn QueueService>,
    address: QueueAddress,
    options: ClientOptions,
    stats: Arc<ClientStats>,
    mut stop: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut delay = options.next_heartbeat_delay();
        loop {
            tokio::select! {
                changed = stop.changed() => {
                    if changed.is_err() || *stop.borrow() {
                        break;
                    }
                    continue;
                }
                _ = tokio::time::sleep(delay) => {}
            }

            match queue.tag_queue(&address, heartbeat_tags()).await {
                Ok(()) => {
                    ClientStats::incr(&stats.heartbeats);
                    debug!(reply_channel = %address, "Renewed reply channel heartbeat");
                    delay = options.next_heartbeat_delay();
                }
                Err(e) => {
                    warn!(reply_channel = %address, error = %e, "Reply channel heartbeat failed");
                    delay = options.heartbeat_retry_delay;
                }
            }
        }
        debug!(reply_channel = %address, "Heartbeat task stopped");
    })
}
