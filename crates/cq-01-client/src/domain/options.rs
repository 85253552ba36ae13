//! Client configuration with validation.

use std::ops::Range;
use std::time::Duration;

/// Options of one [`Client`](crate::Client) instance.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Retries of transient send/receive failures inside `execute`.
    pub max_retries: u32,
    /// The heartbeat tag is renewed after a random delay drawn from this range.
    pub heartbeat_interval: Range<Duration>,
    /// Delete the reply channel when the client is dropped without `close()`.
    pub close_on_drop: bool,
    /// Account owning the work queue, when it is not our own.
    pub host_queue_owner: Option<String>,
    /// Attempts made to resolve the freshly created reply channel.
    pub resolve_attempts: u32,
    /// Pause between reply channel resolution attempts.
    pub resolve_retry_delay: Duration,
    /// Pause before retrying a failed heartbeat.
    pub heartbeat_retry_delay: Duration,
    /// Retention window of the reply channel.
    pub reply_retention: Duration,
    /// Longest single long-poll on the reply channel.
    pub reply_receive_wait: Duration,
    /// Visibility timeout applied to received replies.
    pub reply_visibility_timeout: Duration,
    /// Timeout used by `execute` when the caller passes none.
    pub default_timeout: Duration,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            max_retries: 3,
            heartbeat_interval: Duration::from_secs(60)..Duration::from_secs(120),
            close_on_drop: true,
            host_queue_owner: None,
            resolve_attempts: 10,
            resolve_retry_delay: Duration::from_secs(2),
            heartbeat_retry_delay: Duration::from_secs(5),
            reply_retention: Duration::from_secs(600),
            reply_receive_wait: Duration::from_secs(20),
            reply_visibility_timeout: Duration::from_secs(30),
            default_timeout: Duration::from_secs(60),
        }
    }
}

impl ClientOptions {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.heartbeat_interval.start >= self.heartbeat_interval.end {
            return Err(format!(
                "heartbeat_interval must be a non-empty range, got {:?}",
                self.heartbeat_interval
            ));
        }
        if self.heartbeat_interval.start.is_zero() {
            return Err("heartbeat_interval must start above zero".into());
        }
        if self.resolve_attempts == 0 {
            return Err("resolve_attempts must be at least 1".into());
        }
        if self.reply_receive_wait.is_zero() {
            return Err("reply_receive_wait must be positive".into());
        }
        if self.reply_visibility_timeout.is_zero() {
            return Err("reply_visibility_timeout must be positive".into());
        }
        if self.reply_retention <= self.heartbeat_interval.end {
            return Err(format!(
                "reply_retention ({:?}) must exceed the longest heartbeat interval ({:?})",
                self.reply_retention, self.heartbeat_interval.end
            ));
        }
        Ok(())
    }

    /// Draw the next heartbeat delay.
    pub(crate) fn next_heartbeat_delay(&self) -> Duration {
        use rand::Rng;
        let start = self.heartbeat_interval.start.as_millis() as u64;
        let end = self.heartbeat_interval.end.as_millis() as u64;
        if start >= end {
            return self.heartbeat_interval.start;
        }
        Duration::from_millis(rand::thread_rng().gen_range(start..end))
    }
}
