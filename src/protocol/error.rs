//! Protocol error types

use thiserror::Error;

use crate::crypto::CryptoError;

/// Errors raised while decoding, validating or verifying an envelope
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// The payload is not a syntactically valid envelope
    #[error("Malformed envelope: {0}")]
    Decode(String),

    /// The envelope could not be serialized
    #[error("Failed to encode envelope: {0}")]
    Encode(String),

    /// The protocol version is not on the allow-list
    #[error("Unsupported protocol: {0:?}")]
    UnsupportedProtocol(String),

    /// The content type tag is not a known one
    #[error("Unsupported content type: {0:?}")]
    UnsupportedContentType(String),

    /// The introduction has no sender address
    #[error("Invalid from address")]
    InvalidFromAddr,

    /// The embedded public key is missing, malformed or not RSA
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(#[source] CryptoError),

    /// The signature is missing, malformed or does not verify
    #[error("Invalid signature: {0}")]
    InvalidSignature(#[source] CryptoError),
}

/// Result type for protocol operations
pub type ProtocolResult<T> = Result<T, ProtocolError>;
