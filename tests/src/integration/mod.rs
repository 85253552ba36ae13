//! Cross-crate scenarios.

pub mod correlation;
pub mod reply_channels;
pub mod rpc_flows;
pub mod spool;
