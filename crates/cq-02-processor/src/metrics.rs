//! # Processor Metrics
//!
//! Prometheus metrics for the dispatch loop.
//!
//! ## Usage
//!
//! Enable with the `metrics` feature:
//! ```toml
//! cq-02-processor = { path = "...", features = ["metrics"] }
//! ```
//!
//! ## Metrics Exported
//!
//! - `cq_processor_messages_received_total` - Counter of requests received
//! - `cq_processor_replies_total` - Counter of replies sent (by status)
//! - `cq_processor_replies_dropped_total` - Counter of replies given up on
//! - `cq_processor_poll_failures_total` - Counter of failed receive calls
//! - `cq_processor_in_flight` - Gauge of requests currently being handled
//! - `cq_processor_handler_seconds` - Histogram of handler durations

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref MESSAGES_RECEIVED: IntCounter = register_int_counter!(
        "cq_processor_messages_received_total",
        "Total number of requests received from the work queue"
    )
    .expect("Failed to create MESSAGES_RECEIVED metric");

    /// Replies sent, labeled by status
    pub static ref REPLIES: IntCounterVec = register_int_counter_vec!(
        "cq_processor_replies_total",
        "Total number of replies by status",
        &["status"]
    )
    .expect("Failed to create REPLIES metric");

    pub static ref REPLIES_DROPPED: IntCounter = register_int_counter!(
        "cq_processor_replies_dropped_total",
        "Total number of replies dropped after exhausting delivery attempts"
    )
    .expect("Failed to create REPLIES_DROPPED metric");

    pub static ref POLL_FAILURES: IntCounter = register_int_counter!(
        "cq_processor_poll_failures_total",
        "Total number of failed receive calls"
    )
    .expect("Failed to create POLL_FAILURES metric");

    pub static ref IN_FLIGHT: IntGauge = register_int_gauge!(
        "cq_processor_in_flight",
        "Requests currently being handled"
    )
    .expect("Failed to create IN_FLIGHT metric");

    pub static ref HANDLER_SECONDS: Histogram = register_histogram!(
        "cq_processor_handler_seconds",
        "Command handler duration in seconds"
    )
    .expect("Failed to create HANDLER_SECONDS metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

#[cfg(feature = "metrics")]
pub fn record_messages_received(count: u64) {
    MESSAGES_RECEIVED.inc_by(count);
}

#[cfg(feature = "metrics")]
pub fn record_reply(status: &str) {
    REPLIES.with_label_values(&[status]).inc();
}

#[cfg(feature = "metrics")]
pub fn record_reply_dropped() {
    REPLIES_DROPPED.inc();
}

#[cfg(feature = "metrics")]
pub fn record_poll_failure() {
    POLL_FAILURES.inc();
}

/// Track a request entering (+1) or leaving (-1) the pool
#[cfg(feature = "metrics")]
pub fn adjust_in_flight(delta: i64) {
    IN_FLIGHT.add(delta);
}

#[cfg(feature = "metrics")]
pub fn observe_handler_duration(seconds: f64) {
    HANDLER_SECONDS.observe(seconds);
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_messages_received(_count: u64) {}

#[cfg(not(feature = "metrics"))]
pub fn record_reply(_status: &str) {}

#[cfg(not(feature = "metrics"))]
pub fn record_reply_dropped() {}

#[cfg(not(feature = "metrics"))]
pub fn record_poll_failure() {}

#[cfg(not(feature = "metrics"))]
pub fn adjust_in_flight(_delta: i64) {}

#[cfg(not(feature = "metrics"))]
pub fn observe_handler_duration(_seconds: f64) {}
