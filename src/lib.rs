//! # noxious
//!
//! Bootstrap layer of a peer-to-peer secure chat.
//!
//! Nodes introduce themselves over HTTP with a signed envelope carrying
//! their RSA public key. A receiving node checks the protocol version and
//! content type, verifies the signature against the embedded key and, on
//! success, records the sender in its contact registry.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use noxious::{contacts::ContactRegistry, protocol, server, Identity};
//!
//! // Alice creates an identity and a signed introduction
//! let alice = Identity::generate(2048).unwrap();
//! let envelope = protocol::introduce(&alice, "alice", "bob").unwrap();
//!
//! // Bob's node receives the bytes
//! let contacts = ContactRegistry::new();
//! server::dispatch(&contacts, &envelope.encode().unwrap()).unwrap();
//!
//! assert!(contacts.contains("alice"));
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 server                      │
//! │     POST /  |  access log  |  dispatch      │
//! └─────────────────────┬───────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────┐
//! │                protocol                     │
//! │  envelope codec | validator | verifier      │
//! └──────────┬──────────────────────┬───────────┘
//!            │                      │
//! ┌──────────▼──────────┐ ┌─────────▼───────────┐
//! │       crypto        │ │      contacts       │
//! │ RSA | SHA-256 | PEM │ │  concurrent peers   │
//! └─────────────────────┘ └─────────────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod contacts;
pub mod crypto;
pub mod protocol;
pub mod server;

// Re-export main types at crate root
pub use contacts::{ContactError, ContactRegistry, Peer};
pub use crypto::{CryptoError, CryptoResult, Identity, PublicKey};
pub use protocol::{Envelope, ProtocolError, ProtocolResult};
