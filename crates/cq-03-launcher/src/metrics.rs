//! # Launcher Metrics
//!
//! Enabled with the `metrics` feature.
//!
//! - `cq_launcher_worker_respawns_total` - Counter of stale workers replaced
//! - `cq_launcher_heartbeats_total` - Counter of heartbeat records received
//! - `cq_launcher_workers_alive` - Gauge of worker processes currently tracked

#[cfg(feature = "metrics")]
use lazy_static::lazy_static;

#[cfg(feature = "metrics")]
use prometheus::{register_int_counter, register_int_gauge, IntCounter, IntGauge};

#[cfg(feature = "metrics")]
lazy_static! {
    pub static ref WORKER_RESPAWNS: IntCounter = register_int_counter!(
        "cq_launcher_worker_respawns_total",
        "Total number of workers killed for a stale heartbeat and respawned"
    )
    .expect("Failed to create WORKER_RESPAWNS metric");

    pub static ref HEARTBEATS_RECEIVED: IntCounter = register_int_counter!(
        "cq_launcher_heartbeats_total",
        "Total number of heartbeat records received from workers"
    )
    .expect("Failed to create HEARTBEATS_RECEIVED metric");

    pub static ref WORKERS_ALIVE: IntGauge = register_int_gauge!(
        "cq_launcher_workers_alive",
        "Worker processes currently tracked by the launcher"
    )
    .expect("Failed to create WORKERS_ALIVE metric");
}

// =============================================================================
// METRIC RECORDING FUNCTIONS
// =============================================================================

#[cfg(feature = "metrics")]
pub fn record_respawn() {
    WORKER_RESPAWNS.inc();
}

#[cfg(feature = "metrics")]
pub fn record_heartbeat() {
    HEARTBEATS_RECEIVED.inc();
}

#[cfg(feature = "metrics")]
pub fn set_workers_alive(count: i64) {
    WORKERS_ALIVE.set(count);
}

// =============================================================================
// NO-OP IMPLEMENTATIONS (when metrics feature disabled)
// =============================================================================

#[cfg(not(feature = "metrics"))]
pub fn record_respawn() {}

#[cfg(not(feature = "metrics"))]
pub fn record_heartbeat() {}

#[cfg(not(feature = "metrics"))]
pub fn set_workers_alive(_count: i64) {}
