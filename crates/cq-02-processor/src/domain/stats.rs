use shared_types::Status;
use std::sync::atomic::{AtomicU64, Ordering};

/// Processor counters
#[derive(Debug, Default)]
pub struct ProcessorStats {
    /// Messages received from the work queue
    pub received: AtomicU64,
    /// Replies with status OK
    pub ok: AtomicU64,
    /// Replies with status ERROR
    pub command_failures: AtomicU64,
    /// Replies with status SERVICE_ERROR
    pub service_errors: AtomicU64,
    /// Replies with status COMMAND_NOT_FOUND
    pub not_found: AtomicU64,
    /// Replies dropped after exhausting delivery attempts
    pub replies_dropped: AtomicU64,
    /// Requests without routing attributes, deleted unanswered
    pub unroutable: AtomicU64,
    /// Failed receive calls
    pub poll_failures: AtomicU64,
}

impl ProcessorStats {
    pub(crate) fn record_status(&self, status: Status) {
        let counter = match status {
            Status::Ok => &self.ok,
            Status::Error => &self.command_failures,
            Status::ServiceError => &self.service_errors,
            Status::CommandNotFound => &self.not_found,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    /// Requests that received a reply attempt.
    pub fn handled(&self) -> u64 {
        Self::get(&self.ok)
            + Self::get(&self.command_failures)
            + Self::get(&self.service_errors)
            + Self::get(&self.not_found)
    }
}
