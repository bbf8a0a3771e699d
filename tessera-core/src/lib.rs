//! Tessera Core - dual-channel image provenance
//!
//! Binds an image to its author through two independent channels:
//!
//! - **Metadata channel**: an Ed25519-signed attestation of the exact pixel
//!   hash, stored in a PNG text chunk or JPEG comment. Precise, but lost when
//!   metadata is stripped.
//! - **Watermark channel**: an 8-byte identity and timestamp code hidden in
//!   the chroma plane. Approximate, but survives moderate re-encoding.
//!
//! The [`Verifier`] reads both and fuses them into a single [`TrustStatus`].
//!
//! Key and contact persistence is the caller's job: the core only sees the
//! [`KeyStore`] and [`TrustStore`] traits.
//!
//! # Example
//!
//! ```no_run
//! use tessera_core::{
//!     AdaptiveEmbedder, CandidatePool, ContactBook, DwtDctTransform, KeyStore, LocalIdentity,
//!     ProvenanceConfig, TrustStatus, Verifier,
//! };
//!
//! # fn example() -> tessera_core::Result<()> {
//! let me = LocalIdentity::generate("Alice");
//! let contacts = ContactBook::new();
//! let config = ProvenanceConfig::default();
//!
//! let photo = std::fs::read("photo.jpg").unwrap();
//! let outcome = AdaptiveEmbedder::new(&me, &contacts, &DwtDctTransform, &config).embed(&photo)?;
//!
//! let pool = CandidatePool::new(me.candidate(), &contacts);
//! let report = Verifier::new(&pool, &DwtDctTransform, &config).verify(&outcome.image);
//! assert_eq!(report.status, TrustStatus::Trusted);
//! # Ok(())
//! # }
//! ```

pub mod attestation;
pub mod config;
pub mod container;
pub mod error;
pub mod identity;
pub mod keys;
pub mod sign;
pub mod timecode;
pub mod verify;
pub mod watermark;

// Re-export main types for convenience
pub use attestation::{pixel_hash, AttestationPayload, SignedEnvelope};
pub use config::{ProvenanceConfig, TextureThresholds};
pub use container::{ContainerFormat, EnvelopeLookup, MetadataChannel};
pub use error::{Result, TesseraError, ENVELOPE_VERSION};
pub use identity::{
    fingerprint, hamming_distance, match_best, short_hash, Candidate, IdentityMatch,
};
pub use keys::{CandidatePool, Contact, ContactBook, KeyStore, LocalIdentity, TrustStore};
pub use sign::{sign_image, SignedImage};
pub use timecode::{CorruptedTimeError, MarkTime, TimeCode};
pub use verify::{MetadataFinding, ResolvedTimestamp, TrustStatus, VerificationReport, Verifier};
pub use watermark::{
    AdaptiveEmbedder, DwtDctTransform, EmbedMode, EmbedOutcome, ScanOutcome, Strategy,
    WatermarkPayload, WatermarkScanner, WatermarkTransform,
};
