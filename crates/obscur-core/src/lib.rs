//! ObscurCore Package Core
//!
//! The package state machines: a single-shot writer that multiplexes
//! encrypted+authenticated payload items behind an encrypted, authenticated
//! manifest, and a reader that identifies keys by confirmation, verifies
//! everything, and only then releases plaintext.
//!
//! Wire layout, outermost first:
//!
//! ```text
//! "OCpkg-OHAI"              header tag
//! ManifestHeader            varint-prefixed CBOR, plaintext
//! length ^ mac_key[0..4]    obfuscated manifest length
//! ciphertext manifest       encrypt-then-MAC
//! offset filler             CSPRNG bytes
//! multiplexed payload       per-item cipher+MAC lanes, CSPRNG schedule
//! "KBAI-OCpkg"              trailer tag
//! ```
//!
//! # Security
//!
//! - The manifest authenticates before anything below it is interpreted;
//!   items authenticate before their plaintext reaches any sink.
//! - Key identification is key confirmation with constant-time comparison;
//!   candidate search is the only place the core fans out across threads.
//! - Pre-keys and working keys are zeroised on every exit path.
//! - A call that fails after partial delivery leaves the caller's sinks
//!   holding unauthenticated bytes; callers must discard them, as the
//!   format cannot retroactively vouch for a stream it has not finished
//!   verifying.
//!
//! # Example
//!
//! ```no_run
//! use obscur_core::{
//!     ItemSpec, ManifestWriteKey, PackageWriter, SimpleKeyProvider, WriteOptions,
//!     read_package,
//! };
//! use obscur_proto::PayloadItemKind;
//!
//! # fn main() -> Result<(), obscur_core::PackageError> {
//! let key = vec![0x2Au8; 32];
//!
//! let mut writer = PackageWriter::new(WriteOptions::new(ManifestWriteKey::key(key.clone())))?;
//! writer.add_item(ItemSpec::from_bytes(
//!     PayloadItemKind::Message,
//!     "hello.txt",
//!     b"hello world\n".to_vec(),
//! ))?;
//!
//! let mut package = Vec::new();
//! writer.write(&mut package)?;
//!
//! let mut provider = SimpleKeyProvider::new();
//! provider.add_symmetric_key(key);
//! let contents = read_package(package.as_slice(), &provider)?;
//! assert_eq!(contents.items[0].content, b"hello world\n");
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod errors;
pub mod keys;
pub mod options;
pub mod reader;
pub mod writer;

mod manifest_io;
mod mux;
mod resolve;

pub use errors::PackageError;
pub use keys::{KeyProvider, SimpleKeyProvider};
pub use options::{
    CryptoSuite, ItemKeyPolicy, ItemSpec, ManifestWriteKey, PayloadLayout, WriteOptions,
};
pub use reader::{
    ExtractedItem, ItemSummary, PackageContents, ReadReport, read_package, read_package_with,
};
pub use writer::{PackageWriter, WriteReceipt};
