//! ObscurCore Wire Format
//!
//! The package layout, outermost first:
//!
//! ```text
//! "OCpkg-OHAI"                     10-byte header tag
//! varint(len) + ManifestHeader     Base128-prefixed CBOR DTO
//! length ^ mac_key[0..4]           obfuscated 4-byte LE manifest length
//! ciphertext manifest              encrypt-then-MAC, length bytes
//! payload offset filler            CSPRNG bytes (optional)
//! multiplexed payload region       scheme-dependent
//! "KBAI-OCpkg"                     10-byte trailer tag
//! ```
//!
//! This crate defines the structural layer only: the tags, the header
//! read/write path, and the CBOR data transfer objects for the manifest and
//! its crypto configuration. It never touches key material; the crypto and
//! orchestration layers live above it.
//!
//! DTOs are encoded with CBOR for the same reasons the rest of the format is
//! self-describing: field names ride along, encodings are compact, and no
//! schema codegen is needed. Field names are the compatibility surface —
//! round-trip identity is enforced by property tests.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod config;
pub mod errors;
pub mod header;
pub mod manifest;

pub use config::{
    AuthenticationConfig, KeyConfirmationConfig, KeyDerivationConfig, ManifestCryptoConfig,
    ManifestCryptoPolicy, Pbkdf2Params, ScryptParams, SymmetricCipherConfig,
    SymmetricManifestConfig, Um1ManifestConfig,
};
pub use errors::FormatError;
pub use header::{
    CURRENT_VERSION, HEADER_TAG, ManifestCryptoScheme, ManifestHeader, TRAILER_TAG, read_header,
    read_trailer, write_header, write_trailer,
};
pub use manifest::{
    FrameshiftConfig, Manifest, PayloadConfiguration, PayloadItem, PayloadItemKind,
    PayloadLayoutScheme, PrngConfig,
};
