//! RSA identity management
//!
//! A node proves who it is by signing its introduction with an RSA key
//! pair. Peers learn the public half from the PEM text embedded in that
//! introduction, so this module also owns PEM parsing for public keys.

use std::fs;
use std::path::Path;

use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey, EncodeRsaPublicKey};
use rsa::pkcs8::der::pem;
use rsa::pkcs8::spki::{ObjectIdentifier, SubjectPublicKeyInfoRef};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use zeroize::Zeroizing;

use super::error::{CryptoError, CryptoResult};
use super::hash::{Hash, HashOutput};

/// Key size used when a node has to mint a fresh identity
pub const DEFAULT_KEY_BITS: usize = 2048;

/// `rsaEncryption` from PKCS#1
const RSA_ENCRYPTION_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");

const SPKI_LABEL: &str = "PUBLIC KEY";
const PKCS1_LABEL: &str = "RSA PUBLIC KEY";

/// A peer's RSA public key
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    inner: RsaPublicKey,
    fingerprint: String,
}

impl PublicKey {
    /// Wrap an already decoded RSA key
    pub fn from_rsa(inner: RsaPublicKey) -> CryptoResult<Self> {
        let der = inner
            .to_pkcs1_der()
            .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
        let fingerprint = Hash::hash_hex(der.as_bytes());
        Ok(PublicKey { inner, fingerprint })
    }

    /// Parse a PEM encoded public key.
    ///
    /// Accepts `PUBLIC KEY` (SubjectPublicKeyInfo) and `RSA PUBLIC KEY`
    /// (PKCS#1) blocks. Only the first block in `text` is considered, and
    /// an SPKI block must carry an RSA key.
    pub fn from_pem(text: &str) -> CryptoResult<Self> {
        if text.trim().is_empty() {
            return Err(CryptoError::MissingPublicKey);
        }

        let (label, der) = parse_pem_block(text)?;

        let inner = match label.as_str() {
            SPKI_LABEL => {
                let spki = SubjectPublicKeyInfoRef::try_from(der.as_slice())
                    .map_err(|e| CryptoError::MalformedKey(e.to_string()))?;
                if spki.algorithm.oid != RSA_ENCRYPTION_OID {
                    return Err(CryptoError::UnsupportedKeyAlgorithm(
                        spki.algorithm.oid.to_string(),
                    ));
                }
                RsaPublicKey::from_public_key_der(&der)
                    .map_err(|e| CryptoError::MalformedKey(e.to_string()))?
            }
            PKCS1_LABEL => RsaPublicKey::from_pkcs1_der(&der)
                .map_err(|e| CryptoError::MalformedKey(e.to_string()))?,
            other => return Err(CryptoError::UnsupportedPemLabel(other.to_string())),
        };

        Self::from_rsa(inner)
    }

    /// Encode as an SPKI `PUBLIC KEY` PEM block
    pub fn to_pem(&self) -> CryptoResult<String> {
        self.inner
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| CryptoError::MalformedKey(e.to_string()))
    }

    /// Hex SHA-256 of the PKCS#1 DER encoding, for display and logs
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// The underlying RSA key
    pub fn as_rsa(&self) -> &RsaPublicKey {
        &self.inner
    }

    /// Verify a PKCS#1 v1.5 signature over a precomputed SHA-256 digest
    pub fn verify_digest(&self, digest: &HashOutput, signature: &[u8]) -> CryptoResult<()> {
        self.inner
            .verify(Pkcs1v15Sign::new::<Sha256>(), digest, signature)
            .map_err(|_| CryptoError::SignatureVerificationFailed)
    }

    /// Hash `message` with SHA-256 and verify the signature over it
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> CryptoResult<()> {
        self.verify_digest(&Hash::hash(message), signature)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({}...)", &self.fingerprint[..16])
    }
}

impl std::fmt::Display for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.fingerprint)
    }
}

/// Decode the first PEM block of `text` into its label and DER body.
///
/// Text before the block and after its end boundary is ignored. The block
/// itself must follow the RFC 7468 grammar.
fn parse_pem_block(text: &str) -> CryptoResult<(String, Vec<u8>)> {
    const BEGIN: &str = "-----BEGIN ";
    const END: &str = "-----END ";
    const DASHES: &str = "-----";

    let block = &text[text.find(BEGIN).ok_or(CryptoError::MissingPemBlock)?..];

    let end_line = block.find(END).ok_or(CryptoError::MissingPemBlock)? + END.len();
    let block_len = block[end_line..]
        .find(DASHES)
        .map(|i| end_line + i + DASHES.len())
        .ok_or(CryptoError::MissingPemBlock)?;

    let (label, der) = pem::decode_vec(block[..block_len].as_bytes()).map_err(|e| match e {
        pem::Error::Preamble
        | pem::Error::PreEncapsulationBoundary
        | pem::Error::PostEncapsulationBoundary
        | pem::Error::Label => CryptoError::MissingPemBlock,
        other => CryptoError::MalformedKey(other.to_string()),
    })?;

    Ok((label.to_string(), der))
}

/// A local RSA key pair
pub struct Identity {
    private_key: RsaPrivateKey,
    public_key: PublicKey,
}

impl Identity {
    /// Generate a new random identity with a key of `bits` size
    pub fn generate(bits: usize) -> CryptoResult<Self> {
        let private_key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| CryptoError::KeyGenerationFailed(e.to_string()))?;
        Self::from_private_key(private_key)
    }

    fn from_private_key(private_key: RsaPrivateKey) -> CryptoResult<Self> {
        let public_key = PublicKey::from_rsa(private_key.to_public_key())?;
        Ok(Identity {
            private_key,
            public_key,
        })
    }

    /// Import from a PKCS#8 (`PRIVATE KEY`) or PKCS#1 (`RSA PRIVATE KEY`) PEM
    pub fn from_private_pem(pem: &str) -> CryptoResult<Self> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)
            .or_else(|_| RsaPrivateKey::from_pkcs1_pem(pem))
            .map_err(|e| CryptoError::InvalidSecretKey(e.to_string()))?;
        Self::from_private_key(private_key)
    }

    /// Export the private key as a PKCS#8 PEM
    ///
    /// The returned text is wiped from memory when dropped.
    pub fn to_private_pem(&self) -> CryptoResult<Zeroizing<String>> {
        self.private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| CryptoError::InvalidSecretKey(e.to_string()))
    }

    /// Get the public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Sign a message: SHA-256 digest, PKCS#1 v1.5 padding
    pub fn sign(&self, message: &[u8]) -> CryptoResult<Vec<u8>> {
        let digest = Hash::hash(message);
        self.private_key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &digest)
            .map_err(|e| CryptoError::SigningFailed(e.to_string()))
    }

    /// Load an identity from a private key file
    pub fn load(path: &Path) -> CryptoResult<Self> {
        let pem = Zeroizing::new(fs::read_to_string(path).map_err(|e| key_file_error(path, e))?);
        Self::from_private_pem(&pem)
    }

    /// Write the private and public key files, creating parent directories
    pub fn save(&self, private_path: &Path, public_path: &Path) -> CryptoResult<()> {
        let private_pem = self.to_private_pem()?;
        let public_pem = self.public_key.to_pem()?;

        write_key_file(private_path, private_pem.as_bytes())?;
        write_key_file(public_path, public_pem.as_bytes())?;
        Ok(())
    }

    /// Load the identity at `private_path`, or generate and save a new one.
    ///
    /// Returns the identity and whether it was freshly generated.
    pub fn load_or_generate(
        private_path: &Path,
        public_path: &Path,
        bits: usize,
    ) -> CryptoResult<(Self, bool)> {
        if private_path.exists() {
            return Ok((Self::load(private_path)?, false));
        }

        let identity = Self::generate(bits)?;
        identity.save(private_path, public_path)?;
        Ok((identity, true))
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("public_key", &self.public_key)
            .finish_non_exhaustive()
    }
}

fn write_key_file(path: &Path, contents: &[u8]) -> CryptoResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| key_file_error(parent, e))?;
        }
    }
    fs::write(path, contents).map_err(|e| key_file_error(path, e))
}

fn key_file_error(path: &Path, err: std::io::Error) -> CryptoError {
    CryptoError::KeyFile {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
