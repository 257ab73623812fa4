//! Fuzz target for Base128 varint decoding.

#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let mut input = data;
    if let Ok(value) = obscur_codec::read_uvarint(&mut input) {
        // Whatever decoded must survive a write/read round trip.
        let mut reencoded = Vec::new();
        obscur_codec::write_uvarint(&mut reencoded, value).unwrap();
        let mut replay = reencoded.as_slice();
        assert_eq!(obscur_codec::read_uvarint(&mut replay), Ok(value));
    }
});
