//! Cryptographic error types

use thiserror::Error;

/// Errors that can occur in cryptographic operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// No public key text was supplied
    #[error("Public key PEM is empty")]
    MissingPublicKey,

    /// The text does not contain a PEM block
    #[error("No PEM block found")]
    MissingPemBlock,

    /// The PEM block is not a public-key encoding we understand
    #[error("Unsupported PEM block: {0}")]
    UnsupportedPemLabel(String),

    /// The key is well formed but not an RSA key
    #[error("Unsupported key algorithm: {0}")]
    UnsupportedKeyAlgorithm(String),

    /// The key material could not be decoded
    #[error("Malformed key: {0}")]
    MalformedKey(String),

    /// No signature was supplied
    #[error("Signature is empty")]
    MissingSignature,

    /// The signature is not valid base64
    #[error("Signature is not valid base64")]
    InvalidSignatureEncoding,

    /// Signature verification failed - the signature is invalid
    #[error("Signature verification failed")]
    SignatureVerificationFailed,

    /// Signing operation failed
    #[error("Signing failed: {0}")]
    SigningFailed(String),

    /// Key pair generation failed
    #[error("Key generation failed: {0}")]
    KeyGenerationFailed(String),

    /// The secret key format is invalid
    #[error("Invalid secret key format: {0}")]
    InvalidSecretKey(String),

    /// Reading or writing a key file failed
    #[error("Key file {path}: {reason}")]
    KeyFile {
        /// Path of the key file
        path: String,
        /// What went wrong
        reason: String,
    },
}

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;
