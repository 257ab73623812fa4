//! Package header and trailer.
//!
//! A package opens with the 10-byte ASCII tag `OCpkg-OHAI` followed by the
//! varint-length-prefixed CBOR [`ManifestHeader`], and closes with the
//! 10-byte tag `KBAI-OCpkg`. The header DTO is the only plaintext structure
//! in a package; everything it gates (the manifest, the payload) is
//! encrypted and authenticated.

use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::errors::FormatError;

/// Opening magic: `"OCpkg-OHAI"`.
pub const HEADER_TAG: [u8; 10] = *b"OCpkg-OHAI";

/// Closing magic: `"KBAI-OCpkg"`.
pub const TRAILER_TAG: [u8; 10] = *b"KBAI-OCpkg";

/// Newest format version this implementation reads and writes.
pub const CURRENT_VERSION: i32 = 1;

/// Upper bound on the serialized header DTO, as a varint sanity check.
///
/// A real header is well under a kilobyte; anything near this limit is a
/// corrupt or hostile length prefix.
pub const MAX_HEADER_DTO_LEN: u64 = 64 * 1024;

/// How the manifest pre-key is established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManifestCryptoScheme {
    /// Shared symmetric key or passphrase.
    SymmetricOnly,
    /// One-pass hybrid EC agreement: an ephemeral key against the
    /// recipient's long-term keypair.
    Um1Hybrid,
}

impl ManifestCryptoScheme {
    /// Canonical wire name of the scheme.
    pub fn name(self) -> &'static str {
        match self {
            Self::SymmetricOnly => "SymmetricOnly",
            Self::Um1Hybrid => "Um1Hybrid",
        }
    }
}

/// Plaintext header DTO gating the encrypted manifest.
///
/// `scheme_config` carries the serialized form of the scheme-specific
/// manifest crypto configuration (see [`crate::config::ManifestCryptoConfig`]);
/// it is opaque at this layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestHeader {
    /// Format version; `>= 1` and `<= CURRENT_VERSION`.
    pub format_version: i32,
    /// Manifest crypto scheme selecting the `scheme_config` variant.
    pub scheme: ManifestCryptoScheme,
    /// Whether the manifest plaintext is LZ4-frame compressed before
    /// encryption.
    pub use_compression: bool,
    /// Serialized scheme-specific manifest crypto configuration.
    pub scheme_config: Vec<u8>,
}

/// Write the header tag and the varint-prefixed header DTO.
pub fn write_header<W: Write>(out: &mut W, header: &ManifestHeader) -> Result<(), FormatError> {
    let mut dto = Vec::new();
    ciborium::ser::into_writer(header, &mut dto).map_err(|err| FormatError::Serialization {
        context: "manifest header",
        detail: err.to_string(),
    })?;

    out.write_all(&HEADER_TAG)?;
    obscur_codec::write_uvarint(out, dto.len() as u64)?;
    out.write_all(&dto)?;
    Ok(())
}

/// Read and validate the header tag, then decode the header DTO.
///
/// # Errors
///
/// - `Truncated` if the stream ends inside the tag, length, or DTO.
/// - `Malformed` if the tag bytes are wrong or the length is implausible.
/// - `UnsupportedVersion` if `format_version` is outside `1..=CURRENT_VERSION`.
pub fn read_header<R: Read>(input: &mut R) -> Result<ManifestHeader, FormatError> {
    let mut tag = [0u8; 10];
    input.read_exact(&mut tag).map_err(|err| FormatError::from_io(err, "header tag"))?;
    if tag != HEADER_TAG {
        return Err(FormatError::Malformed { context: "header tag" });
    }

    let len = obscur_codec::read_uvarint(input)
        .map_err(|err| FormatError::from_varint(err, "header length"))?;
    if len > MAX_HEADER_DTO_LEN {
        return Err(FormatError::Malformed { context: "header length" });
    }

    let mut dto = vec![0u8; len as usize];
    input.read_exact(&mut dto).map_err(|err| FormatError::from_io(err, "manifest header"))?;

    let header: ManifestHeader =
        ciborium::de::from_reader(dto.as_slice()).map_err(|_| FormatError::Malformed {
            context: "manifest header",
        })?;

    if header.format_version < 1 || header.format_version > CURRENT_VERSION {
        return Err(FormatError::UnsupportedVersion {
            found: header.format_version,
            supported: CURRENT_VERSION,
        });
    }

    Ok(header)
}

/// Write the trailer tag.
pub fn write_trailer<W: Write>(out: &mut W) -> Result<(), FormatError> {
    out.write_all(&TRAILER_TAG)?;
    Ok(())
}

/// Read the trailer tag; `Ok(true)` if present and intact.
///
/// A missing or corrupt trailer is not an error at this layer — the package
/// reader reports it as a soft failure once the payload has unpacked.
pub fn read_trailer<R: Read>(input: &mut R) -> Result<bool, FormatError> {
    let mut tag = [0u8; 10];
    match input.read_exact(&mut tag) {
        Ok(()) => Ok(tag == TRAILER_TAG),
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(FormatError::Io(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_header() -> ManifestHeader {
        ManifestHeader {
            format_version: CURRENT_VERSION,
            scheme: ManifestCryptoScheme::SymmetricOnly,
            use_compression: true,
            scheme_config: vec![0xDE, 0xAD, 0xBE, 0xEF],
        }
    }

    #[test]
    fn header_round_trip() {
        let header = sample_header();
        let mut wire = Vec::new();
        write_header(&mut wire, &header).unwrap();

        assert_eq!(&wire[..10], b"OCpkg-OHAI");

        let mut input = wire.as_slice();
        let parsed = read_header(&mut input).unwrap();
        assert_eq!(parsed, header);
        assert!(input.is_empty());
    }

    #[test]
    fn wrong_tag_is_malformed() {
        let mut wire = Vec::new();
        write_header(&mut wire, &sample_header()).unwrap();
        wire[0] ^= 0x01;

        let mut input = wire.as_slice();
        assert!(matches!(
            read_header(&mut input),
            Err(FormatError::Malformed { context: "header tag" })
        ));
    }

    #[test]
    fn short_tag_is_truncated() {
        let mut input = &b"OCpkg"[..];
        assert!(matches!(
            read_header(&mut input),
            Err(FormatError::Truncated { context: "header tag" })
        ));
    }

    #[test]
    fn truncated_dto_is_detected() {
        let mut wire = Vec::new();
        write_header(&mut wire, &sample_header()).unwrap();
        wire.truncate(wire.len() - 2);

        let mut input = wire.as_slice();
        assert!(matches!(
            read_header(&mut input),
            Err(FormatError::Truncated { context: "manifest header" })
        ));
    }

    #[test]
    fn future_version_is_rejected() {
        let mut header = sample_header();
        header.format_version = CURRENT_VERSION + 1;
        let mut wire = Vec::new();
        write_header(&mut wire, &header).unwrap();

        let mut input = wire.as_slice();
        assert!(matches!(
            read_header(&mut input),
            Err(FormatError::UnsupportedVersion { found, supported: CURRENT_VERSION })
                if found == CURRENT_VERSION + 1
        ));
    }

    #[test]
    fn zero_version_is_rejected() {
        let mut header = sample_header();
        header.format_version = 0;
        let mut wire = Vec::new();
        write_header(&mut wire, &header).unwrap();

        let mut input = wire.as_slice();
        assert!(matches!(read_header(&mut input), Err(FormatError::UnsupportedVersion { .. })));
    }

    #[test]
    fn hostile_length_prefix_is_rejected() {
        let mut wire = Vec::new();
        wire.extend_from_slice(&HEADER_TAG);
        obscur_codec::write_uvarint(&mut wire, u64::MAX).unwrap();

        let mut input = wire.as_slice();
        assert!(matches!(
            read_header(&mut input),
            Err(FormatError::Malformed { context: "header length" })
        ));
    }

    #[test]
    fn trailer_round_trip() {
        let mut wire = Vec::new();
        write_trailer(&mut wire).unwrap();
        assert_eq!(&wire[..], b"KBAI-OCpkg");

        let mut input = wire.as_slice();
        assert!(read_trailer(&mut input).unwrap());
    }

    #[test]
    fn missing_or_corrupt_trailer_is_soft() {
        let mut empty = &[][..];
        assert!(!read_trailer(&mut empty).unwrap());

        let mut short = &b"KBAI"[..];
        assert!(!read_trailer(&mut short).unwrap());

        let mut wrong = &b"KBAI-XXpkg"[..];
        assert!(!read_trailer(&mut wrong).unwrap());
    }
}
