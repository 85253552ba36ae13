//! Request/reply latency benchmark used by `cq-runtime client`.

use cq_01_client::{Client, ClientError};
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Latency distribution of successful calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LatencySummary {
    pub min: Duration,
    pub mean: Duration,
    pub p50: Duration,
    pub p99: Duration,
    pub max: Duration,
}

impl LatencySummary {
    /// `None` for an empty sample set.
    pub fn from_samples(mut samples: Vec<Duration>) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        samples.sort_unstable();
        let total: Duration = samples.iter().sum();
        let percentile = |p: usize| samples[((samples.len() - 1) * p) / 100];
        Some(Self {
            min: samples[0],
            mean: total / samples.len() as u32,
            p50: percentile(50),
            p99: percentile(99),
            max: samples[samples.len() - 1],
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BenchReport {
    pub ok: usize,
    pub failed: usize,
    pub timeouts: usize,
    pub elapsed: Duration,
    pub latency: Option<LatencySummary>,
}

impl BenchReport {
    pub fn requests_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        (self.ok + self.failed + self.timeouts) as f64 / secs
    }
}

/// Send `requests` sequential `Ping` calls with item ids `1..=requests`.
pub async fn run(client: &Client, requests: usize, timeout: Duration) -> BenchReport {
    let mut samples = Vec::with_capacity(requests);
    let mut report = BenchReport::default();
    let started = Instant::now();

    for item_id in 1..=requests {
        let sent = Instant::now();
        match client
            .execute("Ping", json!({ "item_id": item_id }), Some(timeout))
            .await
        {
            Ok(reply) => {
                samples.push(sent.elapsed());
                report.ok += 1;
                debug!(item_id, reply = %reply, "Ping answered");
            }
            Err(e @ ClientError::Timeout { .. }) => {
                report.timeouts += 1;
                warn!(item_id, error = %e, "Ping timed out");
            }
            Err(e) => {
                report.failed += 1;
                warn!(item_id, error = %e, "Ping failed");
            }
        }
    }

    report.elapsed = started.elapsed();
    report.latency = LatencySummary::from_samples(samples);
    report
}
