//! Protocol version and content type checks

use super::envelope::{ContentType, Envelope};
use super::error::{ProtocolError, ProtocolResult};

/// Version 1 of the protocol
pub const PROTOCOL_V1: &str = "1.0";

/// Protocol versions this node speaks. New versions are added here.
pub const SUPPORTED_PROTOCOLS: &[&str] = &[PROTOCOL_V1];

/// Check a protocol tag against [`SUPPORTED_PROTOCOLS`]
pub fn validate_protocol(tag: &str) -> ProtocolResult<()> {
    if SUPPORTED_PROTOCOLS.contains(&tag) {
        Ok(())
    } else {
        Err(ProtocolError::UnsupportedProtocol(tag.to_string()))
    }
}

/// Check a content type tag against the known content shapes
pub fn validate_content_type(tag: &str) -> ProtocolResult<ContentType> {
    ContentType::from_tag(tag).ok_or_else(|| ProtocolError::UnsupportedContentType(tag.to_string()))
}

/// Protocol first, then content type
pub fn validate(envelope: &Envelope) -> ProtocolResult<ContentType> {
    validate_protocol(&envelope.protocol)?;
    validate_content_type(envelope.content.type_tag())
}
