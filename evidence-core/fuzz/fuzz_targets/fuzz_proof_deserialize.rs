#![no_main]

//! Fuzz target for TimestampProof::deserialize()
//!
//! Malformed proofs must be rejected with an error, never a panic, and a
//! proof that parses must serialize back to the same bytes.
//!
//! Run with: cargo +nightly fuzz run fuzz_proof_deserialize

use evidence_core::TimestampProof;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(proof) = TimestampProof::deserialize(data) {
        let _ = proof.verify();
        if let Ok(bytes) = proof.serialize() {
            assert_eq!(TimestampProof::deserialize(&bytes).ok(), Some(proof));
        }
    }
});
