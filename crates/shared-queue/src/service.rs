//! The Queue Service port.

use crate::error::QueueResult;
use crate::types::{
    AckToken, OutboundMessage, QueueAddress, QueueAttributes, ReceiveOptions, ReceivedMessage,
    Tags,
};
use async_trait::async_trait;

/// Addressable at-least-once message transport.
///
/// Implementations must be safe to share between tasks (`Arc<dyn QueueService>`).
#[async_trait]
pub trait QueueService: Send + Sync {
    /// Create a queue (or return the address of an existing one with that name).
    async fn create_queue(
        &self,
        name: &str,
        attributes: QueueAttributes,
        tags: Tags,
    ) -> QueueResult<QueueAddress>;

    /// Resolve a queue name, optionally owned by another account.
    ///
    /// Fails with `QueueError::NotFound` when no such queue exists.
    async fn resolve_address(&self, name: &str, owner: Option<&str>) -> QueueResult<QueueAddress>;

    /// Merge `tags` into the queue's tags.
    async fn tag_queue(&self, address: &QueueAddress, tags: Tags) -> QueueResult<()>;

    /// Current tags of a queue.
    async fn queue_tags(&self, address: &QueueAddress) -> QueueResult<Tags>;

    /// Addresses of all queues whose name starts with `prefix`.
    async fn list_queues(&self, prefix: &str) -> QueueResult<Vec<QueueAddress>>;

    /// Enqueue one message.
    async fn send_message(&self, address: &QueueAddress, message: OutboundMessage)
        -> QueueResult<()>;

    /// Long-poll for up to `options.max_messages` visible messages.
    ///
    /// Returns an empty batch when `options.wait` elapses with nothing to deliver.
    async fn receive_messages(
        &self,
        address: &QueueAddress,
        options: ReceiveOptions,
    ) -> QueueResult<Vec<ReceivedMessage>>;

    /// Acknowledge (remove) a delivered message. Unknown tokens are ignored.
    async fn delete_message(&self, address: &QueueAddress, token: &AckToken) -> QueueResult<()>;

    /// Remove a queue and its messages. Deleting an absent queue succeeds.
    async fn delete_queue(&self, address: &QueueAddress) -> QueueResult<()>;
}
