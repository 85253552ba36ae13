//! # Client Service
//!
//! One `Client` owns one reply channel. Because every reply for this client
//! lands on that single channel, `execute` calls are serialized: the next
//! request is sent only after the previous one got its reply or gave up.

use crate::domain::{ClientError, ClientOptions, ClientStats, ResponseError};
use crate::heartbeat::{heartbeat_tags, spawn_heartbeat};
use parking_lot::Mutex as SyncMutex;
use shared_queue::{
    OutboundMessage, QueueAddress, QueueAttributes, QueueError, QueueService, ReceiveOptions,
    ReceivedMessage, MAX_RECEIVE_BATCH,
};
use shared_types::{
    Codec, CorrelationId, EnvelopeError, JsonCodec, Payload, ReplyEnvelope, RequestEnvelope,
    CLIENT_QUEUE_NAME_PREFIX,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Linear backoff step between retries of transient queue failures.
const TRANSIENT_BACKOFF: Duration = Duration::from_millis(250);

/// Caller side of the RPC protocol.
pub struct Client {
    queue: Arc<dyn QueueService>,
    codec: Arc<dyn Codec>,
    options: ClientOptions,
    host_address: QueueAddress,
    reply_name: String,
    reply_address: QueueAddress,
    /// Held for the whole of one `execute` call.
    call_lock: Mutex<()>,
    closed: AtomicBool,
    channel_deleted: AtomicBool,
    stats: Arc<ClientStats>,
    heartbeat_stop: watch::Sender<bool>,
    heartbeat_task: SyncMutex<Option<JoinHandle<()>>>,
}

impl Client {
    /// Connect to `host_queue` using the JSON codec.
    pub async fn connect(
        queue: Arc<dyn QueueService>,
        host_queue: &str,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        Self::connect_with_codec(queue, Arc::new(JsonCodec), host_queue, options).await
    }

    /// Resolve the work queue, create and resolve a reply channel, and start
    /// the heartbeat task.
    ///
    /// Fails if the work queue does not exist or the reply channel cannot be
    /// resolved within `options.resolve_attempts`.
    pub async fn connect_with_codec(
        queue: Arc<dyn QueueService>,
        codec: Arc<dyn Codec>,
        host_queue: &str,
        options: ClientOptions,
    ) -> Result<Self, ClientError> {
        options.validate().map_err(ClientError::InvalidOptions)?;

        let host_address = queue
            .resolve_address(host_queue, options.host_queue_owner.as_deref())
            .await?;

        let reply_name = format!("{CLIENT_QUEUE_NAME_PREFIX}-{}", uuid::Uuid::new_v4().simple());
        let attributes = QueueAttributes {
            retention: Some(options.reply_retention),
            receive_wait: Some(options.reply_receive_wait),
        };
        queue
            .create_queue(&reply_name, attributes, heartbeat_tags())
            .await?;

        let reply_address = Self::resolve_reply_channel(queue.as_ref(), &reply_name, &options).await?;

        let stats = Arc::new(ClientStats::default());
        let (heartbeat_stop, stop_rx) = watch::channel(false);
        let heartbeat_task = spawn_heartbeat(
            Arc::clone(&queue),
            reply_address.clone(),
            options.clone(),
            Arc::clone(&stats),
            stop_rx,
        );

        info!(
            host_queue = host_queue,
            reply_channel = %reply_address,
            codec = codec.name(),
            "Client connected"
        );

        Ok(Self {
            queue,
            codec,
            options,
            host_address,
            reply_name,
            reply_address,
            call_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
            channel_deleted: AtomicBool::new(false),
            stats,
            heartbeat_stop,
            heartbeat_task: SyncMutex::new(Some(heartbeat_task)),
        })
    }

    async fn resolve_reply_channel(
        queue: &dyn QueueService,
        name: &str,
        options: &ClientOptions,
    ) -> Result<QueueAddress, ClientError> {
        for attempt in 1..=options.resolve_attempts {
            match queue.resolve_address(name, None).await {
                Ok(address) => return Ok(address),
                Err(e) => {
                    warn!(
                        reply_channel = name,
                        attempt = attempt,
                        error = %e,
                        "Reply channel not resolvable yet"
                    );
                    if attempt < options.resolve_attempts {
                        tokio::time::sleep(options.resolve_retry_delay).await;
                    }
                }
            }
        }
        Err(ClientError::ReplyChannelUnavailable {
            attempts: options.resolve_attempts,
        })
    }

    /// Execute `command` with the default timeout.
    pub async fn call(&self, command: &str, payload: Payload) -> Result<Payload, ClientError> {
        self.execute(command, payload, None).await
    }

    /// Send `command` and wait for its reply.
    ///
    /// Returns the reply payload when the processor answered `OK`,
    /// [`ClientError::Response`] for any other status, and
    /// [`ClientError::Timeout`] once `timeout` (or the default) has elapsed
    /// without a matching reply.
    #[instrument(skip(self, payload), fields(reply_channel = %self.reply_address))]
    pub async fn execute(
        &self,
        command: &str,
        payload: Payload,
        timeout: Option<Duration>,
    ) -> Result<Payload, ClientError> {
        self.ensure_open()?;
        let _serialized = self.call_lock.lock().await;
        self.ensure_open()?;

        let timeout = timeout.unwrap_or(self.options.default_timeout);
        let correlation_id = CorrelationId::new();
        let request = RequestEnvelope::new(
            correlation_id,
            command,
            self.reply_address.as_str(),
            payload,
        );
        let (body, attributes) = request
            .encode(self.codec.as_ref())
            .map_err(EnvelopeError::from)?;

        self.send_request(OutboundMessage::new(body, attributes)).await?;
        ClientStats::incr(&self.stats.requests_sent);
        debug!(correlation_id = %correlation_id, command = command, "Sent request");

        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                ClientStats::incr(&self.stats.timeouts);
                warn!(
                    correlation_id = %correlation_id,
                    command = command,
                    timeout_ms = timeout.as_millis() as u64,
                    "Request timed out"
                );
                return Err(ClientError::Timeout {
                    command: command.to_string(),
                    timeout,
                });
            }

            let wait = remaining.min(self.options.reply_receive_wait);
            let messages = self.receive_replies(wait).await?;
            if let Some(reply) = self.take_matching(correlation_id, messages).await? {
                return self.finish(command, reply);
            }
        }
    }

    /// Delete every message of the batch, returning the decoded reply whose
    /// correlation id matches.
    async fn take_matching(
        &self,
        correlation_id: CorrelationId,
        messages: Vec<ReceivedMessage>,
    ) -> Result<Option<ReplyEnvelope>, ClientError> {
        let mut matched = None;
        for message in messages {
            let is_match = matches!(
                ReplyEnvelope::peek_correlation(&message.attributes),
                Ok(id) if id == correlation_id
            );

            if let Err(e) = self
                .queue
                .delete_message(&self.reply_address, &message.ack_token)
                .await
            {
                warn!(error = %e, "Failed to delete reply message");
            }

            if is_match && matched.is_none() {
                matched = Some(ReplyEnvelope::decode(
                    &message.body,
                    &message.attributes,
                    self.codec.as_ref(),
                )?);
            } else {
                ClientStats::incr(&self.stats.stale_replies_discarded);
                debug!(
                    expected = %correlation_id,
                    received = ?message.attributes.get(shared_types::attr::CORRELATION_ID),
                    "Discarded non-matching reply"
                );
            }
        }
        Ok(matched)
    }

    fn finish(&self, command: &str, reply: ReplyEnvelope) -> Result<Payload, ClientError> {
        if reply.status.is_ok() {
            ClientStats::incr(&self.stats.replies_ok);
            debug!(correlation_id = %reply.correlation_id, command = command, "Received reply");
            Ok(reply.payload)
        } else {
            ClientStats::incr(&self.stats.replies_failed);
            debug!(
                correlation_id = %reply.correlation_id,
                command = command,
                status = %reply.status,
                "Received failure reply"
            );
            Err(ResponseError {
                status: reply.status,
                payload: reply.payload,
            }
            .into())
        }
    }

    async fn send_request(&self, message: OutboundMessage) -> Result<(), QueueError> {
        let mut attempt = 0;
        loop {
            match self
                .queue
                .send_message(&self.host_address, message.clone())
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < self.options.max_retries => {
                    attempt += 1;
                    warn!(attempt = attempt, error = %e, "Retrying request send");
                    tokio::time::sleep(TRANSIENT_BACKOFF * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn receive_replies(&self, wait: Duration) -> Result<Vec<ReceivedMessage>, QueueError> {
        let options = ReceiveOptions::new(
            MAX_RECEIVE_BATCH,
            self.options.reply_visibility_timeout,
            wait,
        );
        let mut attempt = 0;
        loop {
            match self
                .queue
                .receive_messages(&self.reply_address, options)
                .await
            {
                Ok(messages) => return Ok(messages),
                Err(e) if e.is_transient() && attempt < self.options.max_retries => {
                    attempt += 1;
                    warn!(attempt = attempt, error = %e, "Retrying reply receive");
                    tokio::time::sleep(TRANSIENT_BACKOFF * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn ensure_open(&self) -> Result<(), ClientError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(ClientError::Closed)
        } else {
            Ok(())
        }
    }

    /// Stop the heartbeat and delete the reply channel.
    ///
    /// Later calls return `Ok(())` once the channel is gone; after a failed
    /// delete they try again.
    pub async fn close(&self) -> Result<(), ClientError> {
        self.closed.store(true, Ordering::SeqCst);
        if self.channel_deleted.load(Ordering::SeqCst) {
            return Ok(());
        }

        let _ = self.heartbeat_stop.send(true);
        let task = self.heartbeat_task.lock().take();
        if let Some(task) = task {
            task.abort();
        }

        match self.queue.delete_queue(&self.reply_address).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                warn!(reply_channel = %self.reply_address, error = %e, "Failed to delete reply channel");
                return Err(e.into());
            }
        }
        if !self.channel_deleted.swap(true, Ordering::SeqCst) {
            info!(reply_channel = %self.reply_address, "Client closed");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn reply_address(&self) -> &QueueAddress {
        &self.reply_address
    }

    pub fn reply_channel_name(&self) -> &str {
        &self.reply_name
    }

    pub fn host_address(&self) -> &QueueAddress {
        &self.host_address
    }

    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        if let Some(task) = self.heartbeat_task.get_mut().take() {
            task.abort();
        }
        if !self.options.close_on_drop || self.channel_deleted.load(Ordering::SeqCst) {
            return;
        }

        // Best effort: without a runtime the channel is left to the reaper.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(reply_channel = %self.reply_address, "No runtime to delete reply channel on drop");
            return;
        };
        let queue = Arc::clone(&self.queue);
        let address = self.reply_address.clone();
        runtime.spawn(async move {
            if let Err(e) = queue.delete_queue(&address).await {
                warn!(reply_channel = %address, error = %e, "Failed to delete reply channel on drop");
            }
        });
    }
}
