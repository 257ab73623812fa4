//! Fuzz target for manifest DTO decoding.
//!
//! The manifest decoder runs on authenticated plaintext in production, but
//! it must still be panic-free: a hostile writer controls these bytes up to
//! the point authentication fails.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let _ = obscur_proto::Manifest::decode(data);
});
