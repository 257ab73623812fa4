//! Structural error types for the wire format.
//!
//! These cover the byte-level failure modes only: truncation, tag and schema
//! mismatches, version skew, and serializer failures. Cryptographic failures
//! (authentication, key search) belong to the layers above and never appear
//! here.

use obscur_codec::VarintError;
use thiserror::Error;

/// Errors raised while reading or writing package structure.
#[derive(Error, Debug)]
pub enum FormatError {
    /// The stream ended before a structural element was complete.
    #[error("truncated input while reading {context}")]
    Truncated {
        /// Which structural element was being read.
        context: &'static str,
    },

    /// Bytes were present but did not match the expected structure.
    #[error("malformed {context}")]
    Malformed {
        /// Which structural element failed to parse.
        context: &'static str,
    },

    /// The header declares a format version newer than this implementation.
    #[error("unsupported format version {found} (supported up to {supported})")]
    UnsupportedVersion {
        /// Version found in the header.
        found: i32,
        /// Newest version this implementation reads.
        supported: i32,
    },

    /// A DTO failed to encode or decode.
    #[error("serialization failed for {context}: {detail}")]
    Serialization {
        /// Which DTO was being processed.
        context: &'static str,
        /// Serializer-reported detail.
        detail: String,
    },

    /// The underlying stream failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FormatError {
    /// Map a varint decoding failure onto the structural taxonomy.
    pub(crate) fn from_varint(err: VarintError, context: &'static str) -> Self {
        match err {
            VarintError::Truncated => Self::Truncated { context },
            VarintError::Overlong => Self::Malformed { context },
            VarintError::Io(detail) => {
                Self::Io(std::io::Error::other(detail))
            },
        }
    }

    /// Map an `UnexpectedEof` from `read_exact` onto `Truncated`.
    pub(crate) fn from_io(err: std::io::Error, context: &'static str) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::Truncated { context }
        } else {
            Self::Io(err)
        }
    }
}
