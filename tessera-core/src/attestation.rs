use std::io;

use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Result, TesseraError, ENVELOPE_VERSION};
use crate::identity::fingerprint;
use crate::keys::KeyStore;

/// SHA-256 of the raw RGB8 pixel bytes, lowercase hex.
///
/// Binds a signature to image content independently of container, compression
/// settings or metadata.
pub fn pixel_hash(image: &DynamicImage) -> String {
    hex::encode(Sha256::digest(image.to_rgb8().as_raw()))
}

/// The claim an author signs.
///
/// Field names are part of the wire format; keys are sorted before signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttestationPayload {
    pub author: String,
    pub pixel_hash: String,
    /// UTC, ISO-8601 without offset (`YYYY-MM-DDTHH:MM:SS.ffffff`).
    pub timestamp: String,
}

impl AttestationPayload {
    /// Build a payload stamped with the current time.
    pub fn new(pixel_hash: impl Into<String>, author: impl Into<String>) -> Self {
        Self::at(pixel_hash, author, Utc::now())
    }

    pub fn at(
        pixel_hash: impl Into<String>,
        author: impl Into<String>,
        when: DateTime<Utc>,
    ) -> Self {
        Self {
            author: author.into(),
            pixel_hash: pixel_hash.into(),
            timestamp: when.format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
        }
    }

    /// The exact bytes that are signed and verified.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        canonicalize(self)
    }
}

/// Deterministic JSON: keys sorted, `", "` / `": "` separators, non-ASCII
/// escaped as `\uXXXX`.
pub fn canonicalize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    // Maps in `serde_json::Value` are ordered by key unless `preserve_order`
    // is enabled; payload fields are declared sorted for that case.
    let value = serde_json::to_value(value)?;
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, CanonicalFormatter);
    value.serialize(&mut ser)?;
    Ok(out)
}

struct CanonicalFormatter;

impl serde_json::ser::Formatter for CanonicalFormatter {
    fn begin_array_value<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_key<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        first: bool,
    ) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + io::Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn write_string_fragment<W: ?Sized + io::Write>(
        &mut self,
        writer: &mut W,
        fragment: &str,
    ) -> io::Result<()> {
        for ch in fragment.chars() {
            if ch.is_ascii() {
                writer.write_all(&[ch as u8])?;
            } else {
                let mut units = [0u16; 2];
                for unit in ch.encode_utf16(&mut units) {
                    write!(writer, "\\u{:04x}", unit)?;
                }
            }
        }
        Ok(())
    }
}

/// Sign a payload's canonical bytes.
pub fn sign_payload(payload: &AttestationPayload, key_store: &dyn KeyStore) -> Result<Vec<u8>> {
    Ok(key_store.sign(&payload.canonical_bytes()?))
}

/// Check an Ed25519 signature over a payload's canonical bytes.
///
/// Malformed keys or signatures verify as `false`.
pub fn verify_payload(payload: &AttestationPayload, signature: &[u8], public_key: &[u8]) -> bool {
    let Ok(message) = payload.canonical_bytes() else {
        return false;
    };
    let Ok(key_bytes) = <[u8; 32]>::try_from(public_key) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(&key_bytes) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };

    verifying_key.verify(&message, &signature).is_ok()
}

/// A signed attestation as stored in the image's metadata slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEnvelope {
    #[serde(rename = "tessera_version")]
    pub version: String,
    pub payload: AttestationPayload,
    #[serde(with = "base64_bytes")]
    pub signature: Vec<u8>,
    #[serde(rename = "signer_pubkey", with = "base64_bytes")]
    pub signer_public_key: Vec<u8>,
}

impl SignedEnvelope {
    /// Sign `payload` with the given identity.
    pub fn sign(payload: AttestationPayload, key_store: &dyn KeyStore) -> Result<Self> {
        let signature = sign_payload(&payload, key_store)?;
        Ok(Self {
            version: ENVELOPE_VERSION.to_string(),
            payload,
            signature,
            signer_public_key: key_store.public_key_bytes(),
        })
    }

    /// Sign the current pixels of `image` as `key_store`'s author.
    pub fn for_image(image: &DynamicImage, key_store: &dyn KeyStore) -> Result<Self> {
        let payload = AttestationPayload::new(pixel_hash(image), key_store.display_name());
        Self::sign(payload, key_store)
    }

    /// Whether the signature covers the payload under the embedded key.
    pub fn verify_signature(&self) -> bool {
        verify_payload(&self.payload, &self.signature, &self.signer_public_key)
    }

    pub fn signer_fingerprint(&self) -> String {
        fingerprint(&self.signer_public_key)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TesseraError::Serialization(e.to_string()))
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s.trim()).map_err(serde::de::Error::custom)
    }
}
