//! Error-tolerant identity matching.
//!
//! A watermark carries only a 4-byte short code derived from the signer's
//! public key. After lossy re-encoding some of its 32 bits may be flipped, so
//! decoded codes are compared against every known key by Hamming distance and
//! accepted only below a fixed tolerance.

use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of a short identity code in bytes.
pub const SHORT_CODE_LEN: usize = 4;

/// Distance reported for buffers that cannot be compared.
pub const DISTANCE_SENTINEL: u32 = u32::MAX;

/// Compact identity tag: the first four hex digits of
/// `sha256(base64(public_key))`, as ASCII bytes.
pub type ShortCode = [u8; SHORT_CODE_LEN];

/// A known identity that a watermark may resolve to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub display_name: String,
    pub public_key: Vec<u8>,
}

impl Candidate {
    pub fn new(display_name: impl Into<String>, public_key: impl Into<Vec<u8>>) -> Self {
        Self {
            display_name: display_name.into(),
            public_key: public_key.into(),
        }
    }

    /// Expected short code for this candidate.
    pub fn short_code(&self) -> ShortCode {
        short_hash(&self.public_key)
    }

    /// Trust-store lookup key for this candidate.
    pub fn fingerprint(&self) -> String {
        fingerprint(&self.public_key)
    }
}

/// A resolved match: who, and how many bits differed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityMatch {
    pub display_name: String,
    pub fingerprint: String,
    pub distance: u32,
}

/// Compute the short identity code of a public key.
pub fn short_hash(public_key: &[u8]) -> ShortCode {
    let encoded = STANDARD.encode(public_key);
    let digest = hex::encode(Sha256::digest(encoded.as_bytes()));

    let mut code = [0u8; SHORT_CODE_LEN];
    code.copy_from_slice(&digest.as_bytes()[..SHORT_CODE_LEN]);
    code
}

/// SHA-256 fingerprint of raw public-key bytes, lowercase hex.
pub fn fingerprint(public_key: &[u8]) -> String {
    hex::encode(Sha256::digest(public_key))
}

/// Number of differing bits between two equal-length buffers.
///
/// Buffers of different lengths never match and get [`DISTANCE_SENTINEL`].
pub fn hamming_distance(a: &[u8], b: &[u8]) -> u32 {
    if a.len() != b.len() {
        return DISTANCE_SENTINEL;
    }

    a.iter().zip(b.iter()).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Find the candidate closest to `found`, if it is within tolerance.
///
/// A candidate is accepted only when its distance is strictly below
/// `tolerance_bits`. On equal distances the earlier candidate wins, so the
/// pool's first entry (self) has priority.
pub fn match_best<'a, I>(found: &[u8], candidates: I, tolerance_bits: u32) -> Option<IdentityMatch>
where
    I: IntoIterator<Item = &'a Candidate>,
{
    let mut best: Option<(&Candidate, u32)> = None;

    for candidate in candidates {
        let distance = hamming_distance(found, &candidate.short_code());
        if distance >= tolerance_bits {
            continue;
        }
        if best.map_or(true, |(_, d)| distance < d) {
            best = Some((candidate, distance));
        }
    }

    best.map(|(candidate, distance)| IdentityMatch {
        display_name: candidate.display_name.clone(),
        fingerprint: candidate.fingerprint(),
        distance,
    })
}
