//! # Shared Types Crate
//!
//! Wire-level vocabulary spoken between Clients and Processors over the
//! shared work queue.
//!
//! ## Message Flow
//!
//! ```text
//! Client ──RequestEnvelope──→ WorkQueue ──→ Processor
//!   ↑                                          │
//!   └──────── ReplyChannel ←──ReplyEnvelope────┘
//! ```
//!
//! ## Design Principles
//!
//! - **Attributes carry routing**: `correlation_id`, `command_name`,
//!   `reply_address` and `status` travel as string message attributes so a
//!   receiver can route without decoding the body.
//! - **Body carries payload**: the body is an opaque byte string produced by
//!   a pluggable [`Codec`].

pub mod codec;
pub mod correlation;
pub mod envelope;
pub mod errors;
pub mod status;

pub use codec::{Codec, JsonCodec, Payload};
pub use correlation::CorrelationId;
pub use envelope::{attr, MessageAttributes, ReplyEnvelope, RequestEnvelope, RequestRoute};
pub use errors::{CodecError, EnvelopeError};
pub use status::Status;

/// Name prefix of every client reply channel.
pub const CLIENT_QUEUE_NAME_PREFIX: &str = "cqmq-cl";

/// Tag holding the unix timestamp (seconds) of a reply channel's last heartbeat.
pub const CLIENT_QUEUE_HEARTBEAT_TAG: &str = "cqmq:HeartbeatAt";

/// Current unix time in whole seconds.
pub fn unix_now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
