//! Base128 unsigned varints.
//!
//! The package header DTO is length-prefixed with a Base128 varint: seven
//! value bits per byte, least-significant group first, high bit set on every
//! byte except the last. A `u64` therefore occupies at most ten bytes.

use std::io::{Read, Write};

use thiserror::Error;

/// Longest legal encoding of a `u64` (ceil(64 / 7) bytes).
pub const MAX_VARINT_LEN: usize = 10;

/// Errors from varint decoding.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VarintError {
    /// The stream ended before the terminating byte.
    #[error("truncated varint")]
    Truncated,

    /// More than [`MAX_VARINT_LEN`] continuation bytes, or bits beyond 64.
    #[error("overlong varint encoding")]
    Overlong,

    /// The underlying stream failed.
    #[error("i/o error while reading varint: {0}")]
    Io(String),
}

/// Encode `value` as a Base128 varint into `out`.
pub fn write_uvarint<W: Write>(out: &mut W, mut value: u64) -> std::io::Result<()> {
    loop {
        let mut byte = (value & 0x7F) as u8;
        value >>= 7;
        if value != 0 {
            byte |= 0x80;
        }
        out.write_all(&[byte])?;
        if value == 0 {
            return Ok(());
        }
    }
}

/// Decode a Base128 varint from `input`.
pub fn read_uvarint<R: Read>(input: &mut R) -> Result<u64, VarintError> {
    let mut value: u64 = 0;
    let mut shift: u32 = 0;

    for _ in 0..MAX_VARINT_LEN {
        let mut byte = [0u8; 1];
        match input.read_exact(&mut byte) {
            Ok(()) => {},
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(VarintError::Truncated);
            },
            Err(err) => return Err(VarintError::Io(err.to_string())),
        }

        let group = u64::from(byte[0] & 0x7F);

        // The tenth byte may only carry the final bit of a u64.
        if shift == 63 && group > 1 {
            return Err(VarintError::Overlong);
        }

        value |= group << shift;

        if byte[0] & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }

    Err(VarintError::Overlong)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn encode(value: u64) -> Vec<u8> {
        let mut out = Vec::new();
        write_uvarint(&mut out, value).unwrap();
        out
    }

    #[test]
    fn single_byte_values() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(1), vec![0x01]);
        assert_eq!(encode(127), vec![0x7F]);
    }

    #[test]
    fn multi_byte_values() {
        assert_eq!(encode(128), vec![0x80, 0x01]);
        assert_eq!(encode(300), vec![0xAC, 0x02]);
        assert_eq!(encode(u64::MAX).len(), MAX_VARINT_LEN);
    }

    #[test]
    fn truncated_input_is_detected() {
        let mut input = &[0x80u8][..];
        assert_eq!(read_uvarint(&mut input), Err(VarintError::Truncated));

        let mut empty = &[][..];
        assert_eq!(read_uvarint(&mut empty), Err(VarintError::Truncated));
    }

    #[test]
    fn overlong_encoding_is_rejected() {
        // Eleven continuation bytes can never be a valid u64.
        let bytes = [0x80u8; 11];
        let mut input = &bytes[..];
        assert_eq!(read_uvarint(&mut input), Err(VarintError::Overlong));

        // Ten bytes whose tenth carries more than one bit overflows.
        let mut overflow = vec![0xFFu8; 9];
        overflow.push(0x7F);
        let mut input = &overflow[..];
        assert_eq!(read_uvarint(&mut input), Err(VarintError::Overlong));
    }

    #[test]
    fn decoding_stops_at_terminator() {
        // Trailing bytes after the terminator stay in the stream.
        let bytes = [0x01u8, 0xAB, 0xCD];
        let mut input = &bytes[..];
        assert_eq!(read_uvarint(&mut input).unwrap(), 1);
        assert_eq!(input, &[0xAB, 0xCD]);
    }

    proptest! {
        #[test]
        fn round_trip(value in any::<u64>()) {
            let wire = encode(value);
            let mut input = &wire[..];
            prop_assert_eq!(read_uvarint(&mut input).unwrap(), value);
            prop_assert!(input.is_empty());
        }
    }
}
