//! The wire envelope and its codec
//!
//! ```text
//! {
//!   "content": { "type": "introduction", "from": .., "to": .., "pubPem": .. },
//!   "protocol": "1.0",
//!   "signature": "<base64>"
//! }
//! ```
//!
//! Decoding is purely syntactic: an unknown or missing content type lands
//! in [`Content::Unsupported`] and is rejected later by the validator. A
//! known content carrying fields of the other type fails to decode, so
//! every field that reaches the signature check is covered by it.

use base64::alphabet;
use base64::engine::{GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize};

use super::canonical;
use super::error::{ProtocolError, ProtocolResult};
use crate::crypto::CryptoError;

/// Padded standard base64. Decoding tolerates non-zero trailing bits,
/// as Go's `StdEncoding` does.
const WIRE_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Decode wire base64, skipping embedded line breaks
fn decode_base64(text: &str) -> Result<Vec<u8>, base64::DecodeError> {
    WIRE_BASE64.decode(text.replace(|c: char| c == '\r' || c == '\n', ""))
}

/// Read JSON `null` as the field's default
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Tag of an introduction content
pub const INTRODUCTION: &str = "introduction";

/// Tag of an encrypted data content
pub const ENCRYPTED_DATA: &str = "encryptedData";

/// The known content shapes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// Registers a peer's public key
    Introduction,
    /// Opaque encrypted payload
    EncryptedData,
}

impl ContentType {
    /// The wire tag
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Introduction => INTRODUCTION,
            ContentType::EncryptedData => ENCRYPTED_DATA,
        }
    }

    /// Look up a wire tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            INTRODUCTION => Some(ContentType::Introduction),
            ENCRYPTED_DATA => Some(ContentType::EncryptedData),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Introduction content
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Introduction {
    /// Sender address
    pub from: String,
    /// Intended recipient address
    pub to: String,
    /// Sender public key, PEM text
    pub pub_pem: String,
}

/// Encrypted data content
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncryptedData {
    /// Sender address in the clear
    pub clear_from: String,
    /// Ciphertext
    pub data: Vec<u8>,
}

/// Envelope content, discriminated by its `type` tag
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireContent", into = "WireContent")]
pub enum Content {
    /// `type = "introduction"`
    Introduction(Introduction),
    /// `type = "encryptedData"`
    EncryptedData(EncryptedData),
    /// Any other tag, including a missing one
    Unsupported(String),
}

impl Content {
    /// The raw type tag as it appears on the wire
    pub fn type_tag(&self) -> &str {
        match self {
            Content::Introduction(_) => INTRODUCTION,
            Content::EncryptedData(_) => ENCRYPTED_DATA,
            Content::Unsupported(tag) => tag,
        }
    }

    /// The content type, if the tag is a known one
    pub fn content_type(&self) -> Option<ContentType> {
        match self {
            Content::Introduction(_) => Some(ContentType::Introduction),
            Content::EncryptedData(_) => Some(ContentType::EncryptedData),
            Content::Unsupported(_) => None,
        }
    }

    /// Canonical byte form that signatures cover
    ///
    /// Compact JSON with keys in the order `from, pubPem, to, type,
    /// clearFrom, data`, empty fields omitted, `data` as padded standard
    /// base64 and HTML-sensitive characters escaped (see [`canonical`]).
    pub fn canonical_bytes(&self) -> ProtocolResult<Vec<u8>> {
        canonical::to_canonical_vec(&WireContent::from(self.clone()))
            .map_err(|e| ProtocolError::Encode(e.to_string()))
    }
}

impl Default for Content {
    fn default() -> Self {
        Content::Unsupported(String::new())
    }
}

/// Flat wire shape of the content object. Field order is signature relevant.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct WireContent {
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    from: String,
    #[serde(
        rename = "pubPem",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    pub_pem: String,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    to: String,
    #[serde(
        rename = "type",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    kind: String,
    #[serde(
        rename = "clearFrom",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "String::is_empty"
    )]
    clear_from: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty", with = "base64_bytes")]
    data: Vec<u8>,
}

impl TryFrom<WireContent> for Content {
    type Error = String;

    fn try_from(wire: WireContent) -> Result<Self, Self::Error> {
        match ContentType::from_tag(&wire.kind) {
            Some(ContentType::Introduction) => {
                if !wire.clear_from.is_empty() || !wire.data.is_empty() {
                    return Err("introduction content must not carry clearFrom or data".into());
                }
                Ok(Content::Introduction(Introduction {
                    from: wire.from,
                    to: wire.to,
                    pub_pem: wire.pub_pem,
                }))
            }
            Some(ContentType::EncryptedData) => {
                if !wire.from.is_empty() || !wire.to.is_empty() || !wire.pub_pem.is_empty() {
                    return Err("encryptedData content must not carry from, to or pubPem".into());
                }
                Ok(Content::EncryptedData(EncryptedData {
                    clear_from: wire.clear_from,
                    data: wire.data,
                }))
            }
            None => Ok(Content::Unsupported(wire.kind)),
        }
    }
}

impl From<Content> for WireContent {
    fn from(content: Content) -> Self {
        match content {
            Content::Introduction(intro) => WireContent {
                from: intro.from,
                pub_pem: intro.pub_pem,
                to: intro.to,
                kind: INTRODUCTION.to_string(),
                ..Default::default()
            },
            Content::EncryptedData(data) => WireContent {
                kind: ENCRYPTED_DATA.to_string(),
                clear_from: data.clear_from,
                data: data.data,
                ..Default::default()
            },
            Content::Unsupported(kind) => WireContent {
                kind,
                ..Default::default()
            },
        }
    }
}

/// `Vec<u8>` as a padded standard base64 string; `null` reads as empty
mod base64_bytes {
    use super::{decode_base64, WIRE_BASE64};
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&WIRE_BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(s) => decode_base64(&s).map_err(serde::de::Error::custom),
            None => Ok(Vec::new()),
        }
    }
}

/// A signed wire message
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Typed content
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: Content,
    /// Protocol version tag
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub protocol: String,
    /// Base64 signature over the canonical content bytes
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "String::is_empty")]
    pub signature: String,
}

impl Envelope {
    /// Create an unsigned envelope
    pub fn new(protocol: impl Into<String>, content: Content) -> Self {
        Envelope {
            content,
            protocol: protocol.into(),
            signature: String::new(),
        }
    }

    /// Parse an envelope from its JSON bytes
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::Decode(e.to_string()))
    }

    /// Serialize to JSON bytes
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::Encode(e.to_string()))
    }

    /// Canonical bytes of the content, the exact range signatures cover
    pub fn content_bytes(&self) -> ProtocolResult<Vec<u8>> {
        self.content.canonical_bytes()
    }

    /// The content type, or `UnsupportedContentType` for unknown tags
    pub fn content_type(&self) -> ProtocolResult<ContentType> {
        self.content
            .content_type()
            .ok_or_else(|| ProtocolError::UnsupportedContentType(self.content.type_tag().to_string()))
    }

    /// The introduction content, if that is what this envelope carries
    pub fn introduction(&self) -> Option<&Introduction> {
        match &self.content {
            Content::Introduction(intro) => Some(intro),
            _ => None,
        }
    }

    /// Sender address of an introduction
    pub fn from_addr(&self) -> ProtocolResult<&str> {
        match self.introduction() {
            Some(intro) if !intro.from.is_empty() => Ok(&intro.from),
            _ => Err(ProtocolError::InvalidFromAddr),
        }
    }

    /// PEM public key of an introduction
    pub fn public_key_pem(&self) -> ProtocolResult<&str> {
        match self.introduction() {
            Some(intro) if !intro.pub_pem.is_empty() => Ok(&intro.pub_pem),
            _ => Err(ProtocolError::InvalidPublicKey(CryptoError::MissingPublicKey)),
        }
    }

    /// Decoded signature bytes
    pub fn signature_bytes(&self) -> ProtocolResult<Vec<u8>> {
        if self.signature.is_empty() {
            return Err(ProtocolError::InvalidSignature(CryptoError::MissingSignature));
        }
        decode_base64(&self.signature)
            .map_err(|_| ProtocolError::InvalidSignature(CryptoError::InvalidSignatureEncoding))
    }

    /// Attach a signature, base64 encoding it
    pub fn set_signature(&mut self, signature: &[u8]) {
        self.signature = WIRE_BASE64.encode(signature);
    }
}
