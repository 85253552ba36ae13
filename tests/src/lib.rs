//! # Command-Queue Test Suite
//!
//! End-to-end scenarios that wire a real `Client`, `Processor` and queue
//! service together.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── src/
//! │   ├── fixtures.rs            # Harness: queue + running processor + clients
//! │   └── integration/
//! │       ├── rpc_flows.rs       # Ping / failure / not-found round trips
//! │       ├── correlation.rs     # timeouts, stale replies, concurrent clients
//! │       ├── reply_channels.rs  # close, drop, reaping
//! │       └── spool.rs           # cross-instance round trip over a spool dir
//! └── benches/
//!     └── rpc_benchmarks.rs
//! ```
//!
//! Launcher scenarios live next to the launcher crate, where the probe
//! worker binary is available.
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p cq-tests
//! cargo test -p cq-tests integration::correlation::
//! cargo bench -p cq-tests
//! ```

#![allow(clippy::unwrap_used, clippy::expect_used)]

pub mod fixtures;
pub mod integration;
