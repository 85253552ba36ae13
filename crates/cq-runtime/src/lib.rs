//! # Command Queue Runtime
//!
//! Entry points of the `cq-runtime` binary plus the demo command set.
//!
//! ```text
//! cq-runtime create-queue -q orders
//! cq-runtime launcher -q orders --workers 4     # spawns `cq-runtime worker`
//! cq-runtime client -q orders -n 1000           # Ping benchmark
//! cq-runtime reap                               # delete abandoned reply channels
//! ```
//!
//! All processes share one `SpoolQueueService` directory (`--spool-dir` /
//! `CQ_SPOOL_DIR`).

pub mod bench;
pub mod cli;
pub mod commands;
