//! The contact registry
//!
//! Known peers, keyed by address, in introduction order. A single
//! reader/writer lock guards both the address index and the ordered list,
//! so every mutation updates them together and readers never observe one
//! without the other.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::crypto::PublicKey;

/// Registry errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContactError {
    /// A peer with this address is already registered
    #[error("Contact already exists: {0}")]
    AlreadyExists(String),

    /// No peer with this address is registered
    #[error("No such contact: {0}")]
    NoSuchContact(String),
}

/// Result type for registry operations
pub type ContactResult<T> = Result<T, ContactError>;

/// A known peer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Peer {
    address: String,
    public_key: PublicKey,
    active: bool,
}

impl Peer {
    /// Create an inactive peer
    pub fn new(address: impl Into<String>, public_key: PublicKey) -> Self {
        Peer {
            address: address.into(),
            public_key,
            active: false,
        }
    }

    /// Registry key
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Verified public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Liveness flag
    pub fn is_active(&self) -> bool {
        self.active
    }
}

#[derive(Default)]
struct Directory {
    /// address -> position in `peers`
    index: HashMap<String, usize>,
    peers: Vec<Arc<Peer>>,
}

/// Concurrent address -> peer directory
///
/// Peers are immutable once added; replacing one means `remove` then `add`.
/// Readers get shared handles, never mutable access.
#[derive(Default)]
pub struct ContactRegistry {
    inner: RwLock<Directory>,
}

impl ContactRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer. Fails if its address is already present.
    pub fn add(&self, peer: Peer) -> ContactResult<()> {
        let mut dir = self.inner.write();

        if dir.index.contains_key(&peer.address) {
            return Err(ContactError::AlreadyExists(peer.address));
        }

        let position = dir.peers.len();
        dir.index.insert(peer.address.clone(), position);
        dir.peers.push(Arc::new(peer));
        Ok(())
    }

    /// Remove a peer, keeping the remaining peers in order
    pub fn remove(&self, address: &str) -> ContactResult<Arc<Peer>> {
        let mut dir = self.inner.write();

        let position = dir
            .index
            .remove(address)
            .ok_or_else(|| ContactError::NoSuchContact(address.to_string()))?;
        let removed = dir.peers.remove(position);

        // Everything after the hole moved down by one
        for slot in dir.index.values_mut() {
            if *slot > position {
                *slot -= 1;
            }
        }

        Ok(removed)
    }

    /// Look up a peer by address
    pub fn get(&self, address: &str) -> ContactResult<Arc<Peer>> {
        let dir = self.inner.read();
        dir.index
            .get(address)
            .map(|&position| Arc::clone(&dir.peers[position]))
            .ok_or_else(|| ContactError::NoSuchContact(address.to_string()))
    }

    /// Snapshot of all peers in introduction order
    pub fn get_all(&self) -> Vec<Arc<Peer>> {
        self.inner.read().peers.clone()
    }

    /// Whether a peer with this address is registered
    pub fn contains(&self, address: &str) -> bool {
        self.inner.read().index.contains_key(address)
    }

    /// Number of registered peers
    pub fn len(&self) -> usize {
        self.inner.read().peers.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ContactRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContactRegistry")
            .field("peers", &self.len())
            .finish()
    }
}
