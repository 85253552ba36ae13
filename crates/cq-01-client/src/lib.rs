//! # CQ-01 Client
//!
//! Caller side of the command queue: sends a named command with a payload to
//! the shared work queue and waits for the correlated reply on a private
//! reply channel.
//!
//! ## Lifecycle
//!
//! ```text
//! connect ──→ resolve work queue
//!         ──→ create reply channel (tagged cqmq:HeartbeatAt=now)
//!         ──→ resolve reply channel (bounded retry)
//!         ──→ spawn heartbeat task
//!
//! execute ──→ send {request-id, command, reply-to} ──→ long-poll reply channel
//!         ←── matching request-id: OK payload / ResponseError
//!         ←── deadline passed: Timeout
//!
//! close   ──→ stop heartbeat, delete reply channel (idempotent)
//! ```
//!
//! Replies whose `request-id` does not match the awaited request are deleted
//! and dropped, so a late answer to an abandoned request can never be
//! mistaken for the answer to a newer one.
//!
//! ## Usage
//!
//! ```ignore
//! let client = Client::connect(queue, "orders", ClientOptions::default()).await?;
//! let reply = client.call("Ping", json!({"item_id": 3})).await?;
//! client.close().await?;
//! ```

#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod domain;
pub mod heartbeat;
pub mod reaper;
pub mod service;

pub use domain::{ClientError, ClientOptions, ClientStats, ResponseError};
pub use reaper::{ReapReport, ReplyChannelReaper};
pub use service::Client;
