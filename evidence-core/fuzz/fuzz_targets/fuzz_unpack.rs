#![no_main]

//! Fuzz target for bundle unpacking
//!
//! Run with: cargo +nightly fuzz run fuzz_unpack

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = evidence_core::unpack(data);
});
