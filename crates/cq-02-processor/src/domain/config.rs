//! # Processor Configuration
//!
//! Built once through [`ProcessorConfig::builder`] and handed to every
//! processor instance as `Arc<ProcessorConfig>`. Nothing mutates it after
//! `build()`.
//!
//! ```ignore
//! let config = ProcessorConfig::builder("orders")
//!     .pool_size(8)
//!     .poll_wait(Duration::from_secs(5))
//!     .sync_command("Ping", ping)
//!     .build()?;
//! ```

use crate::domain::command::CommandResult;
use crate::domain::handler::{AsyncFnHandler, CommandHandler, FnHandler};
use crate::domain::registry::CommandRegistry;
use crate::error::ConfigError;
use shared_queue::MAX_RECEIVE_BATCH;
use shared_types::{Codec, JsonCodec, Payload};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Worker pool size.
pub const DEFAULT_POOL_SIZE: usize = 4;
/// Long-poll wait of one receive.
pub const DEFAULT_POLL_WAIT: Duration = Duration::from_secs(20);
/// Requests stay hidden from other processors this long after receipt.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);
/// Total attempts to deliver a reply to a missing reply channel.
pub const DEFAULT_REPLY_ATTEMPTS: u32 = 5;
pub const DEFAULT_REPLY_RETRY_DELAY: Duration = Duration::from_secs(1);
/// Pause after a failed receive before polling again.
pub const DEFAULT_POLL_ERROR_BACKOFF: Duration = Duration::from_secs(1);

pub struct ProcessorConfig {
    pub queue_name: String,
    /// Account owning the work queue, when it is not our own.
    pub queue_owner: Option<String>,
    pub pool_size: usize,
    pub poll_wait: Duration,
    pub max_messages: usize,
    pub visibility_timeout: Duration,
    pub reply_attempts: u32,
    pub reply_retry_delay: Duration,
    pub poll_error_backoff: Duration,
    pub commands: CommandRegistry,
    pub codec: Arc<dyn Codec>,
}

impl ProcessorConfig {
    pub fn builder(queue_name: impl Into<String>) -> ProcessorConfigBuilder {
        ProcessorConfigBuilder {
            config: ProcessorConfig {
                queue_name: queue_name.into(),
                queue_owner: None,
                pool_size: DEFAULT_POOL_SIZE,
                poll_wait: DEFAULT_POLL_WAIT,
                max_messages: MAX_RECEIVE_BATCH,
                visibility_timeout: DEFAULT_VISIBILITY_TIMEOUT,
                reply_attempts: DEFAULT_REPLY_ATTEMPTS,
                reply_retry_delay: DEFAULT_REPLY_RETRY_DELAY,
                poll_error_backoff: DEFAULT_POLL_ERROR_BACKOFF,
                commands: CommandRegistry::new(),
                codec: Arc::new(JsonCodec),
            },
            error: None,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.queue_name.is_empty() {
            return Err(ConfigError::EmptyQueueName);
        }
        if self.pool_size == 0 {
            return Err(ConfigError::InvalidPoolSize);
        }
        if self.max_messages == 0 || self.max_messages > MAX_RECEIVE_BATCH {
            return Err(ConfigError::InvalidBatchSize(self.max_messages));
        }
        if self.reply_attempts == 0 {
            return Err(ConfigError::InvalidReplyAttempts);
        }
        if self.visibility_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("visibility_timeout"));
        }
        Ok(())
    }
}

impl fmt::Debug for ProcessorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorConfig")
            .field("queue_name", &self.queue_name)
            .field("queue_owner", &self.queue_owner)
            .field("pool_size", &self.pool_size)
            .field("poll_wait", &self.poll_wait)
            .field("max_messages", &self.max_messages)
            .field("visibility_timeout", &self.visibility_timeout)
            .field("reply_attempts", &self.reply_attempts)
            .field("commands", &self.commands)
            .field("codec", &self.codec.name())
            .finish()
    }
}

/// Collects settings and commands; see [`ProcessorConfig::builder`].
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
    /// First registration error, reported by `build()`.
    error: Option<ConfigError>,
}

impl ProcessorConfigBuilder {
    pub fn queue_owner(mut self, owner: impl Into<String>) -> Self {
        self.config.queue_owner = Some(owner.into());
        self
    }

    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.config.pool_size = pool_size;
        self
    }

    pub fn poll_wait(mut self, wait: Duration) -> Self {
        self.config.poll_wait = wait;
        self
    }

    pub fn max_messages(mut self, max_messages: usize) -> Self {
        self.config.max_messages = max_messages;
        self
    }

    pub fn visibility_timeout(mut self, timeout: Duration) -> Self {
        self.config.visibility_timeout = timeout;
        self
    }

    pub fn reply_attempts(mut self, attempts: u32) -> Self {
        self.config.reply_attempts = attempts;
        self
    }

    pub fn reply_retry_delay(mut self, delay: Duration) -> Self {
        self.config.reply_retry_delay = delay;
        self
    }

    pub fn poll_error_backoff(mut self, backoff: Duration) -> Self {
        self.config.poll_error_backoff = backoff;
        self
    }

    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.config.codec = codec;
        self
    }

    /// Register a handler.
    pub fn command(mut self, name: impl Into<String>, handler: Arc<dyn CommandHandler>) -> Self {
        if let Err(e) = self.config.commands.register(name, handler) {
            self.error.get_or_insert(e);
        }
        self
    }

    /// Register a blocking closure as a handler.
    pub fn sync_command<F>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Payload) -> CommandResult + Send + Sync + 'static,
    {
        self.command(name, Arc::new(FnHandler::new(f)))
    }

    /// Register an async closure as a handler.
    pub fn async_command<F, Fut>(self, name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Payload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CommandResult> + Send + 'static,
    {
        self.command(name, Arc::new(AsyncFnHandler::new(f)))
    }

    /// Validate and freeze the configuration.
    pub fn build(self) -> Result<Arc<ProcessorConfig>, ConfigError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        self.config.validate()?;
        Ok(Arc::new(self.config))
    }
}
