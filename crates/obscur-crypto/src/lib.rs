//! ObscurCore Cryptographic Collaborators
//!
//! The primitives the package format consumes by name: cipher engines,
//! keyed authenticators, KDF stretching, key confirmation, the UM1 hybrid
//! agreement, the seeded scheduling CSPRNG, and the MAC/cipher stream
//! decorators the manifest pipeline stacks over the package stream.
//!
//! # Key Lifecycle
//!
//! ```text
//! pre-key (shared secret, passphrase, or UM1 agreement)
//!        │
//!        ▼
//! KDF (scrypt / PBKDF2) → cipher key ‖ MAC key
//!        │
//!        ▼
//! cipher + MAC decorator stack → encrypt-then-MAC package regions
//! ```
//!
//! Pre-keys and working keys live in `Zeroizing` containers and are wiped on
//! every exit path. Authenticator outputs are compared exclusively through
//! `obscur_codec::ct_eq`.
//!
//! # Security
//!
//! - Names resolve through the registry before any key material is touched;
//!   unknown names and inconsistent sizes fail closed.
//! - Key confirmation identifies a candidate key without decrypting, and its
//!   equality check is constant time.
//! - The scheduling CSPRNG is deterministic from manifest-carried seeds;
//!   it provides schedule obfuscation, not secrecy — payload confidentiality
//!   comes from the per-item cipher lanes.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod cipher;
pub mod confirm;
pub mod csprng;
pub mod errors;
pub mod kdf;
pub mod mac;
pub mod registry;
pub mod stream;
pub mod um1;

pub use cipher::{BLOCK_SIZE, CipherDecryptor, CipherEncryptor, StreamTransform};
pub use confirm::{confirm_key, verified_output};
pub use csprng::StreamCsprng;
pub use errors::CryptoError;
pub use kdf::{
    PBKDF2_DEFAULT_PARAMS, SCRYPT_KEY_PARAMS, SCRYPT_PASSPHRASE_PARAMS, WorkingKeys,
    derive_bytes, derive_working_keys,
};
pub use mac::Authenticator;
pub use stream::{CipherReader, CipherWriter, MacReader, MacWriter};
pub use um1::EcKeypair;
