//! Key store and trust store interfaces.
//!
//! The core never touches the filesystem for keys or contacts: callers inject
//! a [`KeyStore`] for the signing identity and a [`TrustStore`] for the people
//! they trust. [`LocalIdentity`] and [`ContactBook`] are the in-memory
//! implementations used by the CLI, which handles their persistence.

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine};
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use ed25519_dalek::{Signer, SigningKey, PUBLIC_KEY_LENGTH};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TesseraError};
use crate::identity::{fingerprint, Candidate};

/// The signing identity.
pub trait KeyStore: Send + Sync {
    /// Name the author signs as.
    fn display_name(&self) -> &str;

    /// Raw public key bytes, stable for the lifetime of the identity.
    fn public_key_bytes(&self) -> Vec<u8>;

    /// Sign a message.
    fn sign(&self, message: &[u8]) -> Vec<u8>;

    /// This identity as a match candidate.
    fn candidate(&self) -> Candidate {
        Candidate::new(self.display_name(), self.public_key_bytes())
    }
}

/// The set of trusted contacts.
pub trait TrustStore: Send + Sync {
    /// All trusted `(name, public key)` pairs, in the order they were added.
    fn contacts(&self) -> Vec<Candidate>;
}

/// An Ed25519 identity held in memory.
pub struct LocalIdentity {
    display_name: String,
    signing_key: SigningKey,
}

impl LocalIdentity {
    /// Generate a fresh identity.
    pub fn generate(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            signing_key: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    pub fn from_signing_key(display_name: impl Into<String>, signing_key: SigningKey) -> Self {
        Self {
            display_name: display_name.into(),
            signing_key,
        }
    }

    /// Load from a PKCS#8 PEM private key.
    pub fn from_pkcs8_pem(display_name: impl Into<String>, pem: &str) -> Result<Self> {
        let signing_key = SigningKey::from_pkcs8_pem(pem)
            .map_err(|e| TesseraError::Key(format!("Invalid PKCS#8 key: {e}")))?;
        Ok(Self::from_signing_key(display_name, signing_key))
    }

    /// Export the private key as PKCS#8 PEM.
    pub fn to_pkcs8_pem(&self) -> Result<String> {
        self.signing_key
            .to_pkcs8_pem(LineEnding::LF)
            .map(|pem| pem.to_string())
            .map_err(|e| TesseraError::Key(format!("Failed to encode key: {e}")))
    }

    /// Base64 of the raw public key, the form contacts exchange.
    pub fn public_key_base64(&self) -> String {
        STANDARD.encode(self.signing_key.verifying_key().as_bytes())
    }

    pub fn fingerprint(&self) -> String {
        fingerprint(self.signing_key.verifying_key().as_bytes())
    }
}

impl fmt::Debug for LocalIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalIdentity")
            .field("display_name", &self.display_name)
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

impl KeyStore for LocalIdentity {
    fn display_name(&self) -> &str {
        &self.display_name
    }

    fn public_key_bytes(&self) -> Vec<u8> {
        self.signing_key.verifying_key().as_bytes().to_vec()
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        self.signing_key.sign(message).to_bytes().to_vec()
    }
}

/// A trusted contact as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    /// Base64 of the raw public key.
    pub key: String,
}

/// In-memory trust store keyed by public-key fingerprint.
///
/// Entries keep the order they were first added in, which is the order
/// equally close watermark matches are resolved in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContactBook {
    entries: IndexMap<String, Contact>,
}

impl ContactBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust `name` with the given base64 public key. Returns the fingerprint.
    ///
    /// Re-adding a key replaces the name it was stored under but keeps its
    /// position.
    pub fn add(&mut self, name: impl Into<String>, key_b64: &str) -> Result<String> {
        let key_b64 = key_b64.trim();
        let key = STANDARD
            .decode(key_b64)
            .map_err(|e| TesseraError::Key(format!("Invalid base64 key: {e}")))?;
        if key.len() != PUBLIC_KEY_LENGTH {
            return Err(TesseraError::Key(format!(
                "Public key must be {PUBLIC_KEY_LENGTH} bytes, got {}",
                key.len()
            )));
        }

        let fp = fingerprint(&key);
        self.entries.insert(
            fp.clone(),
            Contact {
                name: name.into(),
                key: key_b64.to_string(),
            },
        );
        Ok(fp)
    }

    /// Iterate `(fingerprint, contact)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Contact)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TrustStore for ContactBook {
    fn contacts(&self) -> Vec<Candidate> {
        self.entries
            .values()
            .filter_map(|c| {
                STANDARD
                    .decode(&c.key)
                    .ok()
                    .map(|key| Candidate::new(c.name.clone(), key))
            })
            .collect()
    }
}

/// Read-only set of identities a watermark or signature may resolve to.
///
/// Self is always the first entry so it wins exact ties.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    entries: Vec<Candidate>,
}

impl CandidatePool {
    pub fn new(self_identity: Candidate, contacts: &dyn TrustStore) -> Self {
        let mut entries = vec![self_identity];
        entries.extend(contacts.contacts());
        Self { entries }
    }

    /// A pool with no self identity (verification by a third party).
    pub fn from_contacts(contacts: &dyn TrustStore) -> Self {
        Self {
            entries: contacts.contacts(),
        }
    }

    pub fn from_candidates(entries: Vec<Candidate>) -> Self {
        Self { entries }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.entries
    }

    /// Name of the trusted identity with this fingerprint, if any.
    pub fn trusted_name(&self, fingerprint: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|c| c.fingerprint() == fingerprint)
            .map(|c| c.display_name.as_str())
    }
}
