//! Error taxonomy for package reading and writing.
//!
//! Structural and cryptographic failures are never recovered locally; they
//! surface here at the top level. Per-item key misses are aggregated across
//! all items before surfacing. A malformed trailer is deliberately NOT in
//! this enum — the payload has already unpacked by then, so it is reported
//! as a soft flag on the read outcome instead.

use obscur_crypto::CryptoError;
use obscur_proto::FormatError;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised while writing or reading a package.
#[derive(Error, Debug)]
pub enum PackageError {
    /// The stream ended before a structural element was complete.
    #[error("truncated input while reading {context}")]
    Truncated {
        /// Which structural element was being read.
        context: &'static str,
    },

    /// Bytes present but not matching the expected structure.
    #[error("malformed package: {context}")]
    Malformed {
        /// What failed to parse.
        context: String,
    },

    /// The header declares a newer format version than this implementation.
    #[error("unsupported format version {found} (supported up to {supported})")]
    UnsupportedVersion {
        /// Version found in the header.
        found: i32,
        /// Newest supported version.
        supported: i32,
    },

    /// A named scheme is not in the registry.
    #[error("unknown {kind} scheme: {name}")]
    UnknownScheme {
        /// Which registry was searched.
        kind: &'static str,
        /// The unrecognised name.
        name: String,
    },

    /// Sizes or combinations inconsistent with the registry.
    #[error("invalid configuration: {reason}")]
    ConfigurationInvalid {
        /// What was inconsistent.
        reason: String,
    },

    /// No candidate key passed confirmation for the manifest.
    #[error("no candidate key confirmed for the manifest")]
    KeyNotFound,

    /// No candidate key passed confirmation for one or more payload items.
    #[error("no candidate key confirmed for {} payload item(s)", .items.len())]
    ItemKeysNotFound {
        /// Identifier and path of every unresolved item.
        items: Vec<(Uuid, String)>,
    },

    /// The manifest authenticator output did not match.
    #[error("manifest failed authentication")]
    ManifestNotAuthenticated,

    /// A payload item's authenticator output did not match.
    #[error("payload item {path} ({identifier}) failed authentication")]
    ItemNotAuthenticated {
        /// Item identifier.
        identifier: Uuid,
        /// Item path.
        path: String,
    },

    /// An underlying crypto primitive failed.
    #[error("cryptographic failure during {context}")]
    CryptoInternal {
        /// Operation that failed.
        context: &'static str,
    },

    /// The writer already produced a package; a new writer is required.
    #[error("package writer already finished; writers are single-shot")]
    WriterFinished,

    /// The backing stream failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<FormatError> for PackageError {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::Truncated { context } => Self::Truncated { context },
            FormatError::Malformed { context } => Self::Malformed { context: context.to_string() },
            FormatError::UnsupportedVersion { found, supported } => {
                Self::UnsupportedVersion { found, supported }
            },
            FormatError::Serialization { context, detail } => {
                Self::Malformed { context: format!("{context}: {detail}") }
            },
            FormatError::Io(err) => Self::Io(err),
        }
    }
}

impl From<CryptoError> for PackageError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::UnknownScheme { kind, name } => Self::UnknownScheme { kind, name },
            CryptoError::ConfigurationInvalid { reason } => Self::ConfigurationInvalid { reason },
            CryptoError::Internal { context } => Self::CryptoInternal { context },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_errors_map_onto_the_taxonomy() {
        let err: PackageError = FormatError::Truncated { context: "header tag" }.into();
        assert!(matches!(err, PackageError::Truncated { context: "header tag" }));

        let err: PackageError =
            FormatError::UnsupportedVersion { found: 9, supported: 1 }.into();
        assert!(matches!(err, PackageError::UnsupportedVersion { found: 9, supported: 1 }));
    }

    #[test]
    fn crypto_errors_map_onto_the_taxonomy() {
        let err: PackageError =
            CryptoError::UnknownScheme { kind: "cipher", name: "Rot13".into() }.into();
        assert!(matches!(err, PackageError::UnknownScheme { kind: "cipher", .. }));

        let err: PackageError = CryptoError::Internal { context: "scrypt derivation" }.into();
        assert!(matches!(err, PackageError::CryptoInternal { .. }));
    }

    #[test]
    fn aggregate_item_error_counts_items() {
        let err = PackageError::ItemKeysNotFound {
            items: vec![
                (Uuid::from_u128(1), "a.txt".to_string()),
                (Uuid::from_u128(2), "b.txt".to_string()),
            ],
        };
        assert!(err.to_string().contains("2 payload item(s)"));
    }
}
