//! The introduction protocol
//!
//! - `envelope`: wire model and JSON codec
//! - `canonical`: byte form covered by signatures
//! - `validate`: protocol version and content type allow-lists
//! - `introduction`: signing and verifying introductions

pub mod canonical;
pub mod envelope;
pub mod error;
pub mod introduction;
pub mod validate;

pub use envelope::{Content, ContentType, EncryptedData, Envelope, Introduction};
pub use error::{ProtocolError, ProtocolResult};
pub use introduction::{introduce, sign_envelope, verify_introduction, VerifiedIntroduction};
pub use validate::{
    validate, validate_content_type, validate_protocol, PROTOCOL_V1, SUPPORTED_PROTOCOLS,
};
