//! # Message Envelope
//!
//! Requests and replies share one physical shape: a codec-encoded body plus
//! string attributes.
//!
//! | Attribute    | Request | Reply |
//! |--------------|---------|-------|
//! | `request-id` | yes     | yes   |
//! | `command`    | yes     |       |
//! | `reply-to`   | yes     |       |
//! | `status`     |         | yes   |

use crate::codec::{Codec, Payload};
use crate::correlation::CorrelationId;
use crate::errors::{CodecError, EnvelopeError};
use crate::status::Status;
use std::collections::BTreeMap;

/// String attributes attached to a queue message.
pub type MessageAttributes = BTreeMap<String, String>;

/// Attribute names used on the wire.
pub mod attr {
    pub const CORRELATION_ID: &str = "request-id";
    pub const COMMAND: &str = "command";
    pub const REPLY_TO: &str = "reply-to";
    pub const STATUS: &str = "status";
}

fn required<'a>(attrs: &'a MessageAttributes, name: &'static str) -> Result<&'a str, EnvelopeError> {
    attrs
        .get(name)
        .map(String::as_str)
        .ok_or(EnvelopeError::MissingAttribute(name))
}

fn correlation_attr(attrs: &MessageAttributes) -> Result<CorrelationId, EnvelopeError> {
    let raw = required(attrs, attr::CORRELATION_ID)?;
    CorrelationId::parse(raw).map_err(|_| EnvelopeError::InvalidCorrelationId(raw.to_string()))
}

/// Routing information of a request, readable without decoding the body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRoute {
    pub correlation_id: CorrelationId,
    /// `None` when the sender omitted the command attribute.
    pub command_name: Option<String>,
    pub reply_address: String,
}

impl RequestRoute {
    /// Extract routing attributes from a received request.
    pub fn from_attributes(attrs: &MessageAttributes) -> Result<Self, EnvelopeError> {
        Ok(Self {
            correlation_id: correlation_attr(attrs)?,
            command_name: attrs.get(attr::COMMAND).cloned(),
            reply_address: required(attrs, attr::REPLY_TO)?.to_string(),
        })
    }
}

/// A command invocation travelling from a Client to the work queue.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEnvelope {
    pub correlation_id: CorrelationId,
    pub command_name: Option<String>,
    pub reply_address: String,
    pub payload: Payload,
}

impl RequestEnvelope {
    pub fn new(
        correlation_id: CorrelationId,
        command_name: impl Into<String>,
        reply_address: impl Into<String>,
        payload: Payload,
    ) -> Self {
        Self {
            correlation_id,
            command_name: Some(command_name.into()),
            reply_address: reply_address.into(),
            payload,
        }
    }

    /// Produce the message body and attributes.
    pub fn encode(&self, codec: &dyn Codec) -> Result<(Vec<u8>, MessageAttributes), CodecError> {
        let body = codec.encode(&self.payload)?;
        let mut attrs = MessageAttributes::new();
        attrs.insert(attr::CORRELATION_ID.into(), self.correlation_id.to_string());
        attrs.insert(attr::REPLY_TO.into(), self.reply_address.clone());
        if let Some(command) = &self.command_name {
            attrs.insert(attr::COMMAND.into(), command.clone());
        }
        Ok((body, attrs))
    }

    /// Rebuild a request from a received body and attributes.
    pub fn decode(
        body: &[u8],
        attrs: &MessageAttributes,
        codec: &dyn Codec,
    ) -> Result<Self, EnvelopeError> {
        let route = RequestRoute::from_attributes(attrs)?;
        Ok(Self {
            correlation_id: route.correlation_id,
            command_name: route.command_name,
            reply_address: route.reply_address,
            payload: codec.decode(body)?,
        })
    }
}

/// A status-tagged reply travelling from a Processor to a reply channel.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyEnvelope {
    pub correlation_id: CorrelationId,
    pub status: Status,
    pub payload: Payload,
}

impl ReplyEnvelope {
    pub fn new(correlation_id: CorrelationId, status: Status, payload: Payload) -> Self {
        Self {
            correlation_id,
            status,
            payload,
        }
    }

    /// Read only the correlation attribute of a received reply.
    pub fn peek_correlation(attrs: &MessageAttributes) -> Result<CorrelationId, EnvelopeError> {
        correlation_attr(attrs)
    }

    /// Produce the message body and attributes.
    pub fn encode(&self, codec: &dyn Codec) -> Result<(Vec<u8>, MessageAttributes), CodecError> {
        let body = codec.encode(&self.payload)?;
        let mut attrs = MessageAttributes::new();
        attrs.insert(attr::CORRELATION_ID.into(), self.correlation_id.to_string());
        attrs.insert(attr::STATUS.into(), self.status.as_str().into());
        Ok((body, attrs))
    }

    /// Rebuild a reply from a received body and attributes.
    pub fn decode(
        body: &[u8],
        attrs: &MessageAttributes,
        codec: &dyn Codec,
    ) -> Result<Self, EnvelopeError> {
        let correlation_id = correlation_attr(attrs)?;
        let raw_status = required(attrs, attr::STATUS)?;
        let status = raw_status
            .parse::<Status>()
            .map_err(EnvelopeError::UnknownStatus)?;
        Ok(Self {
            correlation_id,
            status,
            payload: codec.decode(body)?,
        })
    }
}
