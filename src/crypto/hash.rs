//! SHA-256 hashing
//!
//! The digest used for introduction signatures and key fingerprints.

use sha2::{Digest, Sha256};

/// Size of a hash output in bytes
pub const HASH_SIZE: usize = 32;

/// A hash output
pub type HashOutput = [u8; HASH_SIZE];

/// Hashing operations
pub struct Hash;

impl Hash {
    /// Compute the SHA-256 digest of data
    pub fn hash(data: &[u8]) -> HashOutput {
        Sha256::digest(data).into()
    }

    /// Compute hash and return as hex string
    pub fn hash_hex(data: &[u8]) -> String {
        hex::encode(Self::hash(data))
    }
}
