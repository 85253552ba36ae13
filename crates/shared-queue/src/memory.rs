//! # In-Memory Queue Service
//!
//! Process-local implementation of [`QueueService`]. Receivers park on a
//! `tokio::sync::Notify` and are woken by sends, by queue deletion, or when
//! the earliest in-flight message becomes visible again.

use crate::error::{QueueError, QueueResult};
use crate::service::QueueService;
use crate::types::{
    AckToken, OutboundMessage, QueueAddress, QueueAttributes, ReceiveOptions, ReceivedMessage,
    Tags,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::MessageAttributes;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

const ADDRESS_SCHEME: &str = "memory://";

/// Account that owns queues created through this service.
pub const DEFAULT_ACCOUNT: &str = "local";

struct StoredMessage {
    id: u64,
    body: Vec<u8>,
    attributes: MessageAttributes,
    sent_at: Instant,
    invisible_until: Option<Instant>,
    receipt: Option<String>,
}

impl StoredMessage {
    fn is_visible(&self, now: Instant) -> bool {
        self.invisible_until.map_or(true, |until| until <= now)
    }
}

struct QueueState {
    attributes: QueueAttributes,
    tags: Tags,
    messages: VecDeque<StoredMessage>,
    notify: Arc<Notify>,
}

impl QueueState {
    fn drop_expired(&mut self, now: Instant) {
        if let Some(retention) = self.attributes.retention {
            self.messages
                .retain(|m| now.saturating_duration_since(m.sent_at) < retention);
        }
    }

    fn claim(&mut self, options: &ReceiveOptions, now: Instant) -> Vec<ReceivedMessage> {
        let mut batch = Vec::new();
        for message in self.messages.iter_mut() {
            if batch.len() >= options.max_messages {
                break;
            }
            if !message.is_visible(now) {
                continue;
            }
            let receipt = format!("{}-{}", message.id, uuid::Uuid::new_v4().simple());
            message.invisible_until = Some(now + options.visibility_timeout);
            message.receipt = Some(receipt.clone());
            batch.push(ReceivedMessage {
                body: message.body.clone(),
                attributes: message.attributes.clone(),
                ack_token: AckToken::new(receipt),
            });
        }
        batch
    }

    fn next_visible_at(&self) -> Option<Instant> {
        self.messages.iter().filter_map(|m| m.invisible_until).min()
    }
}

/// Queue service held entirely in process memory.
pub struct InMemoryQueueService {
    queues: Mutex<HashMap<String, QueueState>>,
    account: String,
    next_message_id: AtomicU64,
}

impl InMemoryQueueService {
    /// Create an empty service owned by [`DEFAULT_ACCOUNT`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_account(DEFAULT_ACCOUNT)
    }

    /// Create an empty service owned by `account`.
    #[must_use]
    pub fn with_account(account: impl Into<String>) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            account: account.into(),
            next_message_id: AtomicU64::new(1),
        }
    }

    /// Number of messages currently stored (visible or in flight).
    pub fn depth(&self, address: &QueueAddress) -> QueueResult<usize> {
        let name = Self::name_of(address)?;
        let queues = self.queues.lock();
        queues
            .get(name)
            .map(|q| q.messages.len())
            .ok_or_else(|| QueueError::not_found(name))
    }

    /// Whether a queue with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.queues.lock().contains_key(name)
    }

    fn address_of(name: &str) -> QueueAddress {
        QueueAddress::new(format!("{ADDRESS_SCHEME}{name}"))
    }

    fn name_of(address: &QueueAddress) -> QueueResult<&str> {
        address
            .as_str()
            .strip_prefix(ADDRESS_SCHEME)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| QueueError::InvalidAddress(address.to_string()))
    }

    fn notifier(&self, name: &str) -> QueueResult<Arc<Notify>> {
        let queues = self.queues.lock();
        queues
            .get(name)
            .map(|q| Arc::clone(&q.notify))
            .ok_or_else(|| QueueError::not_found(name))
    }
}

impl Default for InMemoryQueueService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueueService for InMemoryQueueService {
    async fn create_queue(
        &self,
        name: &str,
        attributes: QueueAttributes,
        tags: Tags,
    ) -> QueueResult<QueueAddress> {
        if name.is_empty() || name.contains('/') {
            return Err(QueueError::InvalidName(name.to_string()));
        }
        let mut queues = self.queues.lock();
        queues.entry(name.to_string()).or_insert_with(|| {
            debug!(queue = name, "Created in-memory queue");
            QueueState {
                attributes,
                tags,
                messages: VecDeque::new(),
                notify: Arc::new(Notify::new()),
            }
        });
        Ok(Self::address_of(name))
    }

    async fn resolve_address(&self, name: &str, owner: Option<&str>) -> QueueResult<QueueAddress> {
        if owner.is_some_and(|owner| owner != self.account) {
            return Err(QueueError::not_found(name));
        }
        if self.queues.lock().contains_key(name) {
            Ok(Self::address_of(name))
        } else {
            Err(QueueError::not_found(name))
        }
    }

    async fn tag_queue(&self, address: &QueueAddress, tags: Tags) -> QueueResult<()> {
        let name = Self::name_of(address)?;
        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(name)
            .ok_or_else(|| QueueError::not_found(name))?;
        queue.tags.extend(tags);
        Ok(())
    }

    async fn queue_tags(&self, address: &QueueAddress) -> QueueResult<Tags> {
        let name = Self::name_of(address)?;
        let queues = self.queues.lock();
        queues
            .get(name)
            .map(|q| q.tags.clone())
            .ok_or_else(|| QueueError::not_found(name))
    }

    async fn list_queues(&self, prefix: &str) -> QueueResult<Vec<QueueAddress>> {
        let queues = self.queues.lock();
        let mut addresses: Vec<_> = queues
            .keys()
            .filter(|name| name.starts_with(prefix))
            .map(|name| Self::address_of(name))
            .collect();
        addresses.sort();
        Ok(addresses)
    }

    async fn send_message(
        &self,
        address: &QueueAddress,
        message: OutboundMessage,
    ) -> QueueResult<()> {
        let name = Self::name_of(address)?;
        let id = self.next_message_id.fetch_add(1, Ordering::Relaxed);
        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(name)
            .ok_or_else(|| QueueError::not_found(name))?;
        queue.messages.push_back(StoredMessage {
            id,
            body: message.body,
            attributes: message.attributes,
            sent_at: Instant::now(),
            invisible_until: None,
            receipt: None,
        });
        queue.notify.notify_waiters();
        Ok(())
    }

    async fn receive_messages(
        &self,
        address: &QueueAddress,
        options: ReceiveOptions,
    ) -> QueueResult<Vec<ReceivedMessage>> {
        let name = Self::name_of(address)?;
        let deadline = Instant::now() + options.wait;

        loop {
            // Register interest before inspecting the queue so a send racing
            // with the check below still wakes us.
            let notify = self.notifier(name)?;
            let notified = notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let wake_at = {
                let mut queues = self.queues.lock();
                let queue = queues
                    .get_mut(name)
                    .ok_or_else(|| QueueError::not_found(name))?;
                let now = Instant::now();
                queue.drop_expired(now);
                let batch = queue.claim(&options, now);
                if !batch.is_empty() || now >= deadline {
                    return Ok(batch);
                }
                queue
                    .next_visible_at()
                    .filter(|at| *at > now)
                    .map_or(deadline, |at| at.min(deadline))
            };

            let _ = tokio::time::timeout_at(wake_at, notified).await;
        }
    }

    async fn delete_message(&self, address: &QueueAddress, token: &AckToken) -> QueueResult<()> {
        let name = Self::name_of(address)?;
        let mut queues = self.queues.lock();
        let queue = queues
            .get_mut(name)
            .ok_or_else(|| QueueError::not_found(name))?;
        queue
            .messages
            .retain(|m| m.receipt.as_deref() != Some(token.as_str()));
        Ok(())
    }

    async fn delete_queue(&self, address: &QueueAddress) -> QueueResult<()> {
        let name = Self::name_of(address)?;
        if let Some(queue) = self.queues.lock().remove(name) {
            queue.notify.notify_waiters();
            debug!(queue = name, "Deleted in-memory queue");
        }
        Ok(())
    }
}
