//! Cryptographic primitives for noxious
//!
//! - `identity`: RSA key pairs, PEM public keys, PKCS#1 v1.5 signatures
//! - `hash`: SHA-256 digests and key fingerprints

pub mod error;
pub mod hash;
pub mod identity;

// Re-export commonly used types
pub use error::{CryptoError, CryptoResult};
pub use hash::Hash;
pub use identity::{Identity, PublicKey, DEFAULT_KEY_BITS};
