use std::sync::atomic::{AtomicU64, Ordering};

/// Counters of one client instance
#[derive(Debug, Default)]
pub struct ClientStats {
    /// Requests put on the work queue
    pub requests_sent: AtomicU64,
    /// Matching replies with status OK
    pub replies_ok: AtomicU64,
    /// Matching replies with any other status
    pub replies_failed: AtomicU64,
    /// Calls that gave up waiting
    pub timeouts: AtomicU64,
    /// Replies discarded because their correlation id did not match
    pub stale_replies_discarded: AtomicU64,
    /// Successful heartbeat renewals
    pub heartbeats: AtomicU64,
}

impl ClientStats {
    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
