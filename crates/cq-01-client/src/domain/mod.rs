//! Client domain: options, errors and counters.

pub mod error;
pub mod options;
pub mod stats;

pub use error::{ClientError, ResponseError};
pub use options::ClientOptions;
pub use stats::ClientStats;
