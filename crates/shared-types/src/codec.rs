//! Payload codec contract.
//!
//! Payloads are structured values (`serde_json::Value`); how they become bytes
//! on the queue is decided by a [`Codec`]. Client and Processor must agree
//! on the codec.

use crate::errors::CodecError;

/// Structured payload exchanged between callers and handlers.
pub type Payload = serde_json::Value;

/// Pluggable payload serialization.
pub trait Codec: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    /// Serialize a payload into a message body.
    fn encode(&self, value: &Payload) -> Result<Vec<u8>, CodecError>;

    /// Deserialize a message body into a payload.
    fn decode(&self, bytes: &[u8]) -> Result<Payload, CodecError>;
}

/// JSON codec (the default).
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, value: &Payload) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(value).map_err(|e| CodecError::Encode {
            codec: self.name(),
            reason: e.to_string(),
        })
    }

    fn decode(&self, bytes: &[u8]) -> Result<Payload, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Decode {
            codec: self.name(),
            reason: e.to_string(),
        })
    }
}
