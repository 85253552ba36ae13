//! # Processor Service
//!
//! ```text
//!            ┌──────────── poll loop (RUNNING) ────────────┐
//! WorkQueue ─┤ receive ≤10 ─→ acquire pool slot ─→ spawn   │
//!            └─────────────────────────────────────────────┘
//!                                         │
//!                          ┌──────────────┴──────────────┐
//!                          │ route → lookup → handler    │
//!                          │ reply (retry on NotFound)   │
//!                          │ delete request              │
//!                          └─────────────────────────────┘
//! ```
//!
//! `stop()` only flips the state to STOPPING. The poll loop then stops
//! receiving, waits until every pool slot is free again and marks the
//! processor STOPPED. Handlers already running are never interrupted.

use crate::domain::{CommandHandler, DispatchOutcome, ProcessorConfig, ProcessorStats};
use crate::error::ProcessorError;
use crate::metrics;
use crate::state::{ProcessorState, StateCell};
use shared_queue::{
    AckToken, OutboundMessage, QueueAddress, QueueService, ReceiveOptions, ReceivedMessage,
};
use shared_types::{CorrelationId, ReplyEnvelope, RequestRoute};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Semaphore};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Lifecycle events, logged by the processor's drain task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorNotice {
    Started { pool_size: usize, poll_wait: Duration },
    StopRequested,
    Stopped { handled: u64 },
}

struct Control {
    name: String,
    state: StateCell,
    stop_tx: watch::Sender<bool>,
    notices: mpsc::UnboundedSender<ProcessorNotice>,
    stats: Arc<ProcessorStats>,
}

/// Cloneable remote control of a running processor.
#[derive(Clone)]
pub struct ProcessorHandle {
    control: Arc<Control>,
}

impl ProcessorHandle {
    /// Request a graceful stop. Safe to call from any context, any number of
    /// times; returns `true` only for the call that initiated the stop.
    pub fn stop(&self) -> bool {
        if !self
            .control
            .state
            .transition(ProcessorState::Running, ProcessorState::Stopping)
        {
            return false;
        }
        let _ = self.control.notices.send(ProcessorNotice::StopRequested);
        self.control.stop_tx.send_replace(true);
        true
    }

    pub fn state(&self) -> ProcessorState {
        self.control.state.load()
    }

    pub fn name(&self) -> &str {
        &self.control.name
    }

    pub fn stats(&self) -> &ProcessorStats {
        &self.control.stats
    }
}

/// Everything a pool task needs to handle one request.
struct Dispatcher {
    name: String,
    config: Arc<ProcessorConfig>,
    queue: Arc<dyn QueueService>,
    address: QueueAddress,
    stats: Arc<ProcessorStats>,
}

impl Dispatcher {
    async fn process_message(&self, message: ReceivedMessage) {
        let route = match RequestRoute::from_attributes(&message.attributes) {
            Ok(route) => route,
            Err(e) => {
                ProcessorStats::incr(&self.stats.unroutable);
                error!(processor = %self.name, error = %e, "Dropping request without routing attributes");
                self.acknowledge(&message.ack_token).await;
                return;
            }
        };

        let handler = route
            .command_name
            .as_deref()
            .and_then(|name| self.config.commands.get(name));
        let command = route.command_name.as_deref().unwrap_or("");

        let outcome = match handler {
            None => {
                debug!(processor = %self.name, command = command, "Command not found");
                DispatchOutcome::CommandNotFound
            }
            Some(handler) => match self.config.codec.decode(&message.body) {
                Ok(payload) => self.invoke(handler, payload).await,
                Err(e) => DispatchOutcome::Unexpected {
                    message: e.to_string(),
                },
            },
        };

        if let DispatchOutcome::Unexpected { message } = &outcome {
            error!(
                fatal = true,
                processor = %self.name,
                correlation_id = %route.correlation_id,
                command = command,
                error = %message,
                "Process message uncaught failure"
            );
        }

        let status = outcome.status();
        self.stats.record_status(status);
        metrics::record_reply(status.as_str());

        self.reply(
            &route.reply_address,
            route.correlation_id,
            ReplyEnvelope::new(route.correlation_id, status, outcome.into_reply_payload()),
        )
        .await;

        // Acknowledge whether or not the reply reached its channel.
        self.acknowledge(&message.ack_token).await;
    }

    /// Run the handler on its own task so a panic surfaces as a `JoinError`.
    async fn invoke(
        &self,
        handler: Arc<dyn CommandHandler>,
        payload: shared_types::Payload,
    ) -> DispatchOutcome {
        let started = Instant::now();
        let result = tokio::spawn(async move { handler.handle(payload).await }).await;
        metrics::observe_handler_duration(started.elapsed().as_secs_f64());

        match result {
            Ok(result) => result.into(),
            Err(join_error) => DispatchOutcome::Unexpected {
                message: crate::panic_message(join_error),
            },
        }
    }

    /// Send a reply, retrying while the reply channel is missing.
    async fn reply(&self, reply_address: &str, correlation_id: CorrelationId, reply: ReplyEnvelope) {
        let (body, attributes) = match reply.encode(self.config.codec.as_ref()) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(processor = %self.name, correlation_id = %correlation_id, error = %e, "Failed to encode reply");
                return;
            }
        };
        let address = QueueAddress::new(reply_address);
        let message = OutboundMessage::new(body, attributes);

        for attempt in 1..=self.config.reply_attempts {
            match self.queue.send_message(&address, message.clone()).await {
                Ok(()) => {
                    debug!(
                        processor = %self.name,
                        correlation_id = %correlation_id,
                        status = %reply.status,
                        "Sent reply"
                    );
                    return;
                }
                Err(e) if e.is_not_found() && attempt < self.config.reply_attempts => {
                    debug!(
                        correlation_id = %correlation_id,
                        attempt = attempt,
                        "Reply channel missing, retrying"
                    );
                    tokio::time::sleep(self.config.reply_retry_delay).await;
                }
                Err(e) => {
                    warn!(
                        processor = %self.name,
                        correlation_id = %correlation_id,
                        reply_channel = reply_address,
                        attempts = attempt,
                        error = %e,
                        "Dropping reply"
                    );
                    break;
                }
            }
        }
        ProcessorStats::incr(&self.stats.replies_dropped);
        metrics::record_reply_dropped();
    }

    async fn acknowledge(&self, token: &AckToken) {
        if let Err(e) = self.queue.delete_message(&self.address, token).await {
            warn!(processor = %self.name, error = %e, "Failed to delete request");
        }
    }
}

/// Consumer of one work queue.
pub struct Processor {
    dispatcher: Arc<Dispatcher>,
    control: Arc<Control>,
    notices_rx: mpsc::UnboundedReceiver<ProcessorNotice>,
}

impl Processor {
    /// Resolve the work queue and prepare a processor with a random name.
    pub async fn new(
        config: Arc<ProcessorConfig>,
        queue: Arc<dyn QueueService>,
    ) -> Result<Self, ProcessorError> {
        Self::with_name(config, queue, uuid::Uuid::new_v4().to_string()).await
    }

    pub async fn with_name(
        config: Arc<ProcessorConfig>,
        queue: Arc<dyn QueueService>,
        name: impl Into<String>,
    ) -> Result<Self, ProcessorError> {
        config.validate()?;
        let address = queue
            .resolve_address(&config.queue_name, config.queue_owner.as_deref())
            .await
            .map_err(|source| ProcessorError::QueueUnavailable {
                queue: config.queue_name.clone(),
                source,
            })?;

        let name = name.into();
        let stats = Arc::new(ProcessorStats::default());
        let (stop_tx, _) = watch::channel(false);
        let (notices, notices_rx) = mpsc::unbounded_channel();

        Ok(Self {
            dispatcher: Arc::new(Dispatcher {
                name: name.clone(),
                config,
                queue,
                address,
                stats: Arc::clone(&stats),
            }),
            control: Arc::new(Control {
                name,
                state: StateCell::new(),
                stop_tx,
                notices,
                stats,
            }),
            notices_rx,
        })
    }

    pub fn handle(&self) -> ProcessorHandle {
        ProcessorHandle {
            control: Arc::clone(&self.control),
        }
    }

    /// Poll, dispatch and reply until stopped, then drain the pool.
    pub async fn run(self) {
        let Processor {
            dispatcher,
            control,
            notices_rx,
        } = self;
        let config = Arc::clone(&dispatcher.config);

        let drain = tokio::spawn(drain_notices(control.name.clone(), notices_rx));
        let _ = control.notices.send(ProcessorNotice::Started {
            pool_size: config.pool_size,
            poll_wait: config.poll_wait,
        });

        let pool = Arc::new(Semaphore::new(config.pool_size));
        let mut stop_rx = control.stop_tx.subscribe();
        let options = ReceiveOptions::new(
            config.max_messages,
            config.visibility_timeout,
            config.poll_wait,
        );

        while control.state.load() == ProcessorState::Running {
            let received = tokio::select! {
                _ = stop_requested(&mut stop_rx) => break,
                received = dispatcher.queue.receive_messages(&dispatcher.address, options) => received,
            };

            let messages = match received {
                Ok(messages) => messages,
                Err(e) => {
                    ProcessorStats::incr(&control.stats.poll_failures);
                    metrics::record_poll_failure();
                    error!(processor = %control.name, error = %e, "Receive messages failed");
                    tokio::select! {
                        _ = stop_requested(&mut stop_rx) => {}
                        _ = tokio::time::sleep(config.poll_error_backoff) => {}
                    }
                    Vec::new()
                }
            };

            if messages.is_empty() {
                continue;
            }
            debug!(processor = %control.name, count = messages.len(), "Received messages");
            ProcessorStats::add(&control.stats.received, messages.len() as u64);
            metrics::record_messages_received(messages.len() as u64);

            for message in messages {
                let Ok(permit) = Arc::clone(&pool).acquire_owned().await else {
                    break;
                };
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    let _permit = permit;
                    metrics::adjust_in_flight(1);
                    dispatcher.process_message(message).await;
                    metrics::adjust_in_flight(-1);
                });
            }
        }

        // Every slot free again means every submitted request finished.
        if let Ok(all) = pool.acquire_many(config.pool_size as u32).await {
            drop(all);
        }
        control.state.set(ProcessorState::Stopped);

        let _ = control.notices.send(ProcessorNotice::Stopped {
            handled: control.stats.handled(),
        });
        let _ = drain.await;
    }
}

/// Resolves once a stop was requested.
async fn stop_requested(stop_rx: &mut watch::Receiver<bool>) {
    loop {
        if *stop_rx.borrow_and_update() {
            return;
        }
        if stop_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn drain_notices(name: String, mut notices: mpsc::UnboundedReceiver<ProcessorNotice>) {
    while let Some(notice) = notices.recv().await {
        match notice {
            ProcessorNotice::Started {
                pool_size,
                poll_wait,
            } => info!(
                processor = %name,
                pool_size = pool_size,
                poll_wait_secs = poll_wait.as_secs(),
                "Processor started"
            ),
            ProcessorNotice::StopRequested => {
                info!(processor = %name, "Stopping processor (waiting for in-flight commands)")
            }
            ProcessorNotice::Stopped { handled } => {
                info!(processor = %name, handled = handled, "Processor stopped");
                break;
            }
        }
    }
}
