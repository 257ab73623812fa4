//! Fuzz target for package header parsing.
//!
//! Arbitrary bytes must never panic the parser: invalid tags, hostile
//! varint lengths and malformed CBOR DTOs all return errors.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut input = data;
    let _ = obscur_proto::read_header(&mut input);
});
