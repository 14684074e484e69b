//! Introduction signing and verification
//!
//! Verification walks a fixed sequence and stops at the first failure:
//!
//! ```text
//! Start -> KeyExtracted -> KeyParsed -> SignatureExtracted
//!       -> DigestComputed -> Verified
//! ```
//!
//! Nothing is retried. A rejected introduction must be resent by its author.

use tracing::debug;

use super::envelope::{Content, Envelope, Introduction};
use super::error::{ProtocolError, ProtocolResult};
use super::validate::PROTOCOL_V1;
use crate::crypto::{CryptoError, Hash, Identity, PublicKey};

/// A sender that proved control of the key it claims
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedIntroduction {
    /// Sender address
    pub address: String,
    /// Sender public key
    pub public_key: PublicKey,
}

/// Check that an introduction is signed by the key it carries.
///
/// Envelopes carrying anything other than an introduction are rejected
/// with `UnsupportedContentType`.
pub fn verify_introduction(envelope: &Envelope) -> ProtocolResult<VerifiedIntroduction> {
    let intro = match &envelope.content {
        Content::Introduction(intro) => intro,
        other => {
            return Err(ProtocolError::UnsupportedContentType(
                other.type_tag().to_string(),
            ))
        }
    };

    if intro.pub_pem.is_empty() {
        return Err(ProtocolError::InvalidPublicKey(CryptoError::MissingPublicKey));
    }
    debug!(from = %intro.from, "introduction key extracted");

    let public_key = PublicKey::from_pem(&intro.pub_pem).map_err(ProtocolError::InvalidPublicKey)?;
    debug!(from = %intro.from, fingerprint = %public_key.fingerprint(), "introduction key parsed");

    let signature = envelope.signature_bytes()?;

    let digest = Hash::hash(&envelope.content_bytes()?);

    public_key
        .verify_digest(&digest, &signature)
        .map_err(ProtocolError::InvalidSignature)?;
    debug!(from = %intro.from, "introduction signature verified");

    let address = envelope.from_addr()?.to_string();
    Ok(VerifiedIntroduction {
        address,
        public_key,
    })
}

/// Build a signed protocol 1.0 introduction from `identity`
pub fn introduce(identity: &Identity, from: &str, to: &str) -> ProtocolResult<Envelope> {
    let pub_pem = identity
        .public_key()
        .to_pem()
        .map_err(ProtocolError::InvalidPublicKey)?;

    let mut envelope = Envelope::new(
        PROTOCOL_V1,
        Content::Introduction(Introduction {
            from: from.to_string(),
            to: to.to_string(),
            pub_pem,
        }),
    );
    sign_envelope(identity, &mut envelope)?;
    Ok(envelope)
}

/// Sign the envelope's canonical content bytes, replacing any signature
pub fn sign_envelope(identity: &Identity, envelope: &mut Envelope) -> ProtocolResult<()> {
    let signature = identity
        .sign(&envelope.content_bytes()?)
        .map_err(ProtocolError::InvalidSignature)?;
    envelope.set_signature(&signature);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::identity::test_keys::{alice, mallory};
    use crate::protocol::envelope::EncryptedData;

    fn alice_intro() -> Envelope {
        introduce(alice(), "alice", "bob").unwrap()
    }

    fn with_intro(envelope: &mut Envelope, edit: impl FnOnce(&mut Introduction)) {
        match &mut envelope.content {
            Content::Introduction(intro) => edit(intro),
            _ => panic!("not an introduction"),
        }
    }

    #[test]
    fn test_valid_introduction_verifies() {
        let verified = verify_introduction(&alice_intro()).unwrap();

        assert_eq!(verified.address, "alice");
        assert_eq!(&verified.public_key, alice().public_key());
    }

    #[test]
    fn test_survives_wire_roundtrip() {
        let bytes = alice_intro().encode().unwrap();
        let decoded = Envelope::decode(&bytes).unwrap();

        assert!(verify_introduction(&decoded).is_ok());
    }

    #[test]
    fn test_signature_from_other_key_fails() {
        let mut envelope = alice_intro();
        sign_envelope(mallory(), &mut envelope).unwrap();

        assert_eq!(
            verify_introduction(&envelope),
            Err(ProtocolError::InvalidSignature(
                CryptoError::SignatureVerificationFailed
            ))
        );
    }

    #[test]
    fn test_altered_content_fails() {
        let mut envelope = alice_intro();
        with_intro(&mut envelope, |intro| intro.to = "bot".to_string());

        assert_eq!(
            verify_introduction(&envelope),
            Err(ProtocolError::InvalidSignature(
                CryptoError::SignatureVerificationFailed
            ))
        );
    }

    #[test]
    fn test_injected_fields_rejected() {
        let json = String::from_utf8(alice_intro().encode().unwrap()).unwrap();
        let tampered = json.replacen(
            r#""type":"introduction""#,
            r#""type":"introduction","clearFrom":"mallory","data":"AQID""#,
            1,
        );
        assert_ne!(tampered, json);

        assert!(matches!(
            Envelope::decode(tampered.as_bytes()),
            Err(ProtocolError::Decode(_))
        ));
    }

    #[test]
    fn test_signature_from_other_content_fails() {
        let other = introduce(alice(), "alice", "carol").unwrap();
        let mut envelope = alice_intro();
        envelope.signature = other.signature;

        assert!(matches!(
            verify_introduction(&envelope),
            Err(ProtocolError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_impostor_key_swap_fails() {
        // Mallory claims to be alice using alice's signature but her own key
        let mut envelope = alice_intro();
        let mallory_pem = mallory().public_key().to_pem().unwrap();
        with_intro(&mut envelope, |intro| intro.pub_pem = mallory_pem);

        assert!(matches!(
            verify_introduction(&envelope),
            Err(ProtocolError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_empty_key_rejected_first() {
        let mut envelope = alice_intro();
        with_intro(&mut envelope, |intro| intro.pub_pem.clear());
        envelope.signature.clear();

        assert_eq!(
            verify_introduction(&envelope),
            Err(ProtocolError::InvalidPublicKey(CryptoError::MissingPublicKey))
        );
    }

    #[test]
    fn test_unparseable_key_rejected_before_signature() {
        let mut envelope = alice_intro();
        with_intro(&mut envelope, |intro| intro.pub_pem = "garbage".to_string());
        envelope.signature = "!!!".to_string();

        assert_eq!(
            verify_introduction(&envelope),
            Err(ProtocolError::InvalidPublicKey(CryptoError::MissingPemBlock))
        );
    }

    #[test]
    fn test_missing_signature_rejected() {
        let mut envelope = alice_intro();
        envelope.signature.clear();

        assert_eq!(
            verify_introduction(&envelope),
            Err(ProtocolError::InvalidSignature(CryptoError::MissingSignature))
        );
    }

    #[test]
    fn test_non_base64_signature_rejected() {
        let mut envelope = alice_intro();
        envelope.signature = "not*base64".to_string();

        assert_eq!(
            verify_introduction(&envelope),
            Err(ProtocolError::InvalidSignature(
                CryptoError::InvalidSignatureEncoding
            ))
        );
    }

    #[test]
    fn test_empty_from_rejected() {
        let mut envelope = introduce(alice(), "", "bob").unwrap();
        assert_eq!(
            verify_introduction(&envelope),
            Err(ProtocolError::InvalidFromAddr)
        );

        // Still rejected after re-signing
        sign_envelope(alice(), &mut envelope).unwrap();
        assert_eq!(
            verify_introduction(&envelope),
            Err(ProtocolError::InvalidFromAddr)
        );
    }

    #[test]
    fn test_encrypted_data_is_not_an_introduction() {
        let envelope = Envelope::new("1.0", Content::EncryptedData(EncryptedData::default()));

        assert_eq!(
            verify_introduction(&envelope),
            Err(ProtocolError::UnsupportedContentType(
                "encryptedData".to_string()
            ))
        );
    }
}
