//! Fuzz target for the full package read path.
//!
//! Drives the whole state machine — header parsing, key confirmation,
//! KDF, manifest decryption, demultiplexing — with arbitrary bytes and a
//! fixed candidate key. Every input must produce a clean error or a clean
//! read, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use obscur_core::{SimpleKeyProvider, read_package};

fuzz_target!(|data: &[u8]| {
    let mut provider = SimpleKeyProvider::new();
    provider.add_symmetric_key(vec![0x42u8; 32]);
    let _ = read_package(data, &provider);
});
