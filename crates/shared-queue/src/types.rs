//! Value types exchanged with a [`QueueService`](crate::QueueService).

use shared_types::MessageAttributes;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Queue tags (free-form key/value metadata).
pub type Tags = BTreeMap<String, String>;

/// Locator of a queue, as returned by create/resolve.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueAddress(String);

impl QueueAddress {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueueAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for QueueAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Attributes fixed at queue creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueAttributes {
    /// How long an unreceived message is kept before the service drops it.
    pub retention: Option<Duration>,
    /// Default long-poll wait for receivers.
    pub receive_wait: Option<Duration>,
}

/// A message to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub body: Vec<u8>,
    pub attributes: MessageAttributes,
}

impl OutboundMessage {
    pub fn new(body: Vec<u8>, attributes: MessageAttributes) -> Self {
        Self { body, attributes }
    }
}

/// Parameters of one receive call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveOptions {
    /// At most this many messages are returned (capped at 10).
    pub max_messages: usize,
    /// Delivered messages stay hidden from other receivers this long.
    pub visibility_timeout: Duration,
    /// Block up to this long waiting for at least one message.
    pub wait: Duration,
}

impl ReceiveOptions {
    pub fn new(max_messages: usize, visibility_timeout: Duration, wait: Duration) -> Self {
        Self {
            max_messages: max_messages.clamp(1, crate::MAX_RECEIVE_BATCH),
            visibility_timeout,
            wait,
        }
    }
}

/// Handle proving receipt of one delivery; needed to delete the message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AckToken(String);

impl AckToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AckToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One delivery of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub body: Vec<u8>,
    pub attributes: MessageAttributes,
    pub ack_token: AckToken,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_receive_batch_is_clamped() {
        let opts = ReceiveOptions::new(50, Duration::from_secs(30), Duration::from_secs(20));
        assert_eq!(opts.max_messages, 10);

        let opts = ReceiveOptions::new(0, Duration::from_secs(30), Duration::from_secs(20));
        assert_eq!(opts.max_messages, 1);
    }
}
