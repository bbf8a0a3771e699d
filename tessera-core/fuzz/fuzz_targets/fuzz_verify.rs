#![no_main]

//! Fuzz target for verification.
//!
//! Verification must turn any input into a report, never a panic.
//!
//! Run with: cargo +nightly fuzz run fuzz_verify

use libfuzzer_sys::fuzz_target;
use tessera_core::{CandidatePool, Candidate, DwtDctTransform, ProvenanceConfig, Verifier};

fuzz_target!(|data: &[u8]| {
    let pool = CandidatePool::from_candidates(vec![Candidate::new("Fuzz", vec![7u8; 32])]);
    let config = ProvenanceConfig::default();
    let report = Verifier::new(&pool, &DwtDctTransform, &config).verify(data);
    let _ = report.status.to_string();
});
