#![no_main]

//! Fuzz target for envelope lookup.
//!
//! Feeds arbitrary bytes through the JPEG comment walker, the PNG chunk
//! reader and the envelope JSON parser. None of them may panic.
//!
//! Run with: cargo +nightly fuzz run fuzz_envelope

use libfuzzer_sys::fuzz_target;
use tessera_core::{EnvelopeLookup, MetadataChannel, SignedEnvelope};

fuzz_target!(|data: &[u8]| {
    let channel = MetadataChannel::default();
    if let EnvelopeLookup::Found(envelope) = channel.load(data) {
        let _ = envelope.verify_signature();
        let _ = envelope.signer_fingerprint();
    }

    if let Ok(text) = std::str::from_utf8(data) {
        let _ = SignedEnvelope::from_json(text);
    }
});
