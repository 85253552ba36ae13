//! # Error Types
//!
//! Errors raised while turning queue messages into envelopes and back.

use thiserror::Error;

/// Payload encode/decode failure.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    /// The value could not be serialized.
    #[error("Encode failed ({codec}): {reason}")]
    Encode { codec: &'static str, reason: String },

    /// The bytes are not a valid payload for this codec.
    #[error("Decode failed ({codec}): {reason}")]
    Decode { codec: &'static str, reason: String },
}

/// A queue message could not be interpreted as an envelope.
#[derive(Debug, Clone, Error)]
pub enum EnvelopeError {
    /// A required attribute is absent.
    #[error("Missing message attribute '{0}'")]
    MissingAttribute(&'static str),

    /// The correlation attribute is not a valid token.
    #[error("Invalid correlation id: {0}")]
    InvalidCorrelationId(String),

    /// The status attribute is not a known status.
    #[error("Unknown reply status: {0}")]
    UnknownStatus(String),

    /// The body could not be decoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
}
