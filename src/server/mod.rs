//! HTTP boundary of a chat node
//!
//! A single `POST /` endpoint takes an envelope and drives it through the
//! codec, the validator, the introduction verifier and finally the contact
//! registry. Any failure answers `400 bad request`; success answers `200 ok`.
//! The registry is only touched after an introduction fully verifies.
//! Dispatch runs on the blocking pool; should it panic the request answers
//! `500`.

pub mod logging;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{middleware, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::contacts::{ContactError, ContactRegistry, Peer};
use crate::protocol::{self, Content, Envelope, ProtocolError};

/// Body of a successful response
pub const OK_BODY: &str = "ok";

/// Body of a rejected request
pub const BAD_REQUEST_BODY: &str = "bad request";

/// Why an inbound envelope was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// Decoding, validation or verification failed
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The registry refused the peer
    #[error(transparent)]
    Contact(#[from] ContactError),
}

impl DispatchError {
    /// The sender was already known; a resent introduction lands here
    pub fn is_duplicate_introduction(&self) -> bool {
        matches!(self, DispatchError::Contact(ContactError::AlreadyExists(_)))
    }
}

/// What an accepted envelope did
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatched {
    /// A new peer was registered
    Introduced {
        /// Address of the new peer
        address: String,
    },
    /// Encrypted data was acknowledged
    EncryptedData {
        /// Sender address as given in the clear
        clear_from: String,
        /// Ciphertext length in bytes
        len: usize,
    },
}

/// Decode, validate, verify and register
pub fn dispatch(contacts: &ContactRegistry, body: &[u8]) -> Result<Dispatched, DispatchError> {
    let envelope = Envelope::decode(body)?;
    protocol::validate(&envelope)?;

    match &envelope.content {
        Content::Introduction(_) => {
            let verified = protocol::verify_introduction(&envelope)?;
            let fingerprint = verified.public_key.fingerprint().to_string();

            contacts.add(Peer::new(verified.address.clone(), verified.public_key))?;
            info!(address = %verified.address, %fingerprint, "peer registered");

            Ok(Dispatched::Introduced {
                address: verified.address,
            })
        }
        Content::EncryptedData(data) => {
            debug!(clear_from = %data.clear_from, len = data.data.len(), "encrypted data received");
            Ok(Dispatched::EncryptedData {
                clear_from: data.clear_from.clone(),
                len: data.data.len(),
            })
        }
        Content::Unsupported(tag) => {
            Err(ProtocolError::UnsupportedContentType(tag.clone()).into())
        }
    }
}

/// Shared state handed to request handlers
#[derive(Clone, Debug)]
pub struct AppState {
    /// The node's contact registry
    pub contacts: Arc<ContactRegistry>,
}

impl AppState {
    /// Wrap a registry
    pub fn new(contacts: Arc<ContactRegistry>) -> Self {
        AppState { contacts }
    }
}

/// `POST /`
///
/// Key parsing and signature verification run on the blocking pool so a
/// burst of introductions never stalls the reactor.
pub async fn chat_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let outcome = tokio::task::spawn_blocking(move || dispatch(&state.contacts, &body)).await;

    match outcome {
        Ok(Ok(_)) => (StatusCode::OK, OK_BODY).into_response(),
        Ok(Err(err)) if err.is_duplicate_introduction() => {
            info!(error = %err, "duplicate introduction");
            (StatusCode::BAD_REQUEST, BAD_REQUEST_BODY).into_response()
        }
        Ok(Err(err)) => {
            warn!(error = %err, "envelope rejected");
            (StatusCode::BAD_REQUEST, BAD_REQUEST_BODY).into_response()
        }
        Err(err) => {
            error!(error = %err, "dispatch task failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Routes with request logging
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(chat_handler))
        .layer(middleware::from_fn(logging::log_requests))
        .with_state(state)
}

/// Serve until `shutdown` resolves, then let in-flight requests finish
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::identity::test_keys::{alice, mallory};
    use crate::crypto::CryptoError;
    use crate::protocol::{introduce, sign_envelope, EncryptedData, PROTOCOL_V1};

    fn encode(envelope: &Envelope) -> Vec<u8> {
        envelope.encode().unwrap()
    }

    async fn post(state: &AppState, body: Vec<u8>) -> StatusCode {
        chat_handler(State(state.clone()), Bytes::from(body))
            .await
            .status()
    }

    #[test]
    fn test_introduction_registers_peer() {
        let contacts = ContactRegistry::new();
        let envelope = introduce(alice(), "alice", "bob").unwrap();

        let outcome = dispatch(&contacts, &encode(&envelope)).unwrap();

        assert_eq!(
            outcome,
            Dispatched::Introduced {
                address: "alice".to_string()
            }
        );
        assert_eq!(contacts.get("alice").unwrap().public_key(), alice().public_key());
    }

    #[test]
    fn test_unsupported_protocol_rejected_before_signature_check() {
        let contacts = ContactRegistry::new();
        let mut envelope = introduce(alice(), "alice", "bob").unwrap();
        envelope.protocol = "2.0".to_string();
        envelope.signature = "garbage".to_string();

        assert_eq!(
            dispatch(&contacts, &encode(&envelope)),
            Err(DispatchError::Protocol(ProtocolError::UnsupportedProtocol(
                "2.0".to_string()
            )))
        );
        assert!(contacts.is_empty());
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let contacts = ContactRegistry::new();
        let other = introduce(alice(), "alice", "somebody-else").unwrap();
        let mut envelope = introduce(alice(), "alice", "bob").unwrap();
        envelope.signature = other.signature;

        assert_eq!(
            dispatch(&contacts, &encode(&envelope)),
            Err(DispatchError::Protocol(ProtocolError::InvalidSignature(
                CryptoError::SignatureVerificationFailed
            )))
        );
        assert!(!contacts.contains("alice"));
    }

    #[test]
    fn test_reintroduction_keeps_original_key() {
        let contacts = ContactRegistry::new();
        dispatch(&contacts, &encode(&introduce(alice(), "alice", "bob").unwrap())).unwrap();

        let second = introduce(mallory(), "alice", "bob").unwrap();
        let err = dispatch(&contacts, &encode(&second)).unwrap_err();

        assert!(err.is_duplicate_introduction());
        assert_eq!(err, DispatchError::Contact(ContactError::AlreadyExists("alice".to_string())));
        assert_eq!(contacts.get("alice").unwrap().public_key(), alice().public_key());
    }

    #[test]
    fn test_unknown_content_type_rejected() {
        let contacts = ContactRegistry::new();
        let body = br#"{"content":{"type":"unknown","from":"alice","pubPem":"x"},"protocol":"1.0","signature":"AAAA"}"#;

        assert_eq!(
            dispatch(&contacts, body),
            Err(DispatchError::Protocol(ProtocolError::UnsupportedContentType(
                "unknown".to_string()
            )))
        );
    }

    #[test]
    fn test_malformed_body_rejected() {
        let contacts = ContactRegistry::new();
        let err = dispatch(&contacts, b"{\"content\":").unwrap_err();

        assert!(matches!(err, DispatchError::Protocol(ProtocolError::Decode(_))));
        assert!(!err.is_duplicate_introduction());
    }

    #[test]
    fn test_encrypted_data_acknowledged() {
        let contacts = ContactRegistry::new();
        let envelope = Envelope::new(
            PROTOCOL_V1,
            Content::EncryptedData(EncryptedData {
                clear_from: "bob".to_string(),
                data: vec![9; 16],
            }),
        );

        assert_eq!(
            dispatch(&contacts, &encode(&envelope)).unwrap(),
            Dispatched::EncryptedData {
                clear_from: "bob".to_string(),
                len: 16
            }
        );
        assert!(contacts.is_empty());
    }

    #[tokio::test]
    async fn test_handler_status_codes() {
        let state = AppState::new(Arc::new(ContactRegistry::new()));

        let intro = introduce(alice(), "alice", "bob").unwrap();
        assert_eq!(post(&state, encode(&intro)).await, StatusCode::OK);

        // Same introduction again
        assert_eq!(post(&state, encode(&intro)).await, StatusCode::BAD_REQUEST);

        let mut tampered = introduce(mallory(), "mallory", "bob").unwrap();
        sign_envelope(alice(), &mut tampered).unwrap();
        assert_eq!(post(&state, encode(&tampered)).await, StatusCode::BAD_REQUEST);

        assert_eq!(post(&state, b"nope".to_vec()).await, StatusCode::BAD_REQUEST);
        assert_eq!(state.contacts.len(), 1);
    }

    #[tokio::test]
    async fn test_handler_yields_while_verifying() {
        let state = AppState::new(Arc::new(ContactRegistry::new()));
        let body = encode(&introduce(alice(), "alice", "bob").unwrap());

        let handler = tokio::spawn({
            let state = state.clone();
            async move { post(&state, body).await }
        });

        // On this single-threaded runtime an inline verification would
        // finish within the handler's first poll
        let mut polls = 0;
        while !handler.is_finished() {
            tokio::task::yield_now().await;
            polls += 1;
        }

        assert!(polls > 1);
        assert_eq!(handler.await.unwrap(), StatusCode::OK);
        assert!(state.contacts.contains("alice"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_introductions() {
        let state = AppState::new(Arc::new(ContactRegistry::new()));

        let mut tasks = Vec::new();
        for i in 0..16 {
            let state = state.clone();
            // Half of the tasks race on the same address
            let from = if i % 2 == 0 { "alice".to_string() } else { format!("peer-{}", i) };
            let body = encode(&introduce(alice(), &from, "bob").unwrap());
            tasks.push(tokio::spawn(async move { post(&state, body).await }));
        }

        let mut ok = 0;
        for task in tasks {
            if task.await.unwrap() == StatusCode::OK {
                ok += 1;
            }
        }

        // 8 distinct peer-N plus a single winning alice
        assert_eq!(ok, 9);
        assert_eq!(state.contacts.len(), 9);
    }
}
