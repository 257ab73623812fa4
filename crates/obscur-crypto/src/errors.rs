//! Error types for the crypto layer.
//!
//! Two failure families: configuration problems (unknown names, impossible
//! sizes) surfaced before any key material is touched, and internal
//! primitive failures wrapped with context. Authentication mismatches are
//! not errors at this layer — callers compare authenticator outputs
//! themselves so the comparison stays constant time and in one place.

use thiserror::Error;

/// Errors raised by the crypto collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// A scheme name was not found in the registry.
    #[error("unknown {kind} scheme: {name}")]
    UnknownScheme {
        /// Which registry was searched (cipher, mode, mac, kdf, prng, curve).
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

    /// An underlying primitive failed; the context names the operation.
    #[error("crypto primitive failure during {context}")]
    Internal {
        /// Operation that failed.
        context: &'static str,
    },
}
