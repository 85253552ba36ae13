//! # Shared Queue - Queue Service Contract
//!
//! The RPC core never talks to a concrete broker. It consumes the
//! [`QueueService`] port: addressable queues with at-least-once delivery,
//! long-poll receive and visibility-timeout semantics.
//!
//! ```text
//! ┌──────────┐  send_message   ┌──────────────┐  receive_messages  ┌───────────┐
//! │  Client  │ ──────────────→ │ QueueService │ ←───────────────── │ Processor │
//! │          │ ←────────────── │              │ ─────────────────→ │           │
//! └──────────┘  (reply chan)   └──────────────┘   delete_message   └───────────┘
//! ```
//!
//! ## Adapters
//!
//! - [`InMemoryQueueService`]: single process, used by tests and embedded setups.
//! - [`SpoolQueueService`]: a directory tree shared by separate processes on
//!   one host; this is what launcher-managed workers use locally.
//!
//! Neither adapter guarantees ordering; both redeliver a message whose
//! visibility timeout lapses before it is deleted.

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod error;
pub mod memory;
pub mod service;
pub mod spool;
pub mod types;

pub use error::{QueueError, QueueResult};
pub use memory::InMemoryQueueService;
pub use service::QueueService;
pub use spool::SpoolQueueService;
pub use types::{
    AckToken, OutboundMessage, QueueAddress, QueueAttributes, ReceiveOptions, ReceivedMessage,
    Tags,
};

/// Upper bound on messages returned by one receive call.
pub const MAX_RECEIVE_BATCH: usize = 10;
