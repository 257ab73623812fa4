//! Write-side configuration: crypto suite, payload layout, key selection.
//!
//! Everything random (IVs, salts, scheduling seeds, ephemeral keys) is drawn
//! at write time from the writer's RNG, never stored here. The options only
//! name schemes and ranges; the registry validates them when the writer is
//! constructed, so a misconfigured writer fails before touching any stream.

use obscur_crypto::EcKeypair;
use obscur_proto::{FrameshiftConfig, PayloadItemKind, PayloadLayoutScheme};
use zeroize::Zeroizing;

/// How the manifest pre-key is established on write.
pub enum ManifestWriteKey {
    /// High-entropy shared symmetric key.
    Key(Zeroizing<Vec<u8>>),
    /// Low-entropy passphrase; gets the expensive KDF profile.
    Passphrase(Zeroizing<String>),
    /// UM1 hybrid: the sender's long-term keypair and the recipient's
    /// public key. A fresh ephemeral keypair is generated per write.
    Um1 {
        /// Sender's long-term keypair.
        sender: EcKeypair,
        /// Recipient's long-term public key.
        recipient_public: [u8; 32],
    },
}

impl std::fmt::Debug for ManifestWriteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Key(_) => "Key",
            Self::Passphrase(_) => "Passphrase",
            Self::Um1 { .. } => "Um1",
        };
        f.debug_tuple("ManifestWriteKey").field(&label).finish()
    }
}

impl ManifestWriteKey {
    /// Shared symmetric key.
    pub fn key(key: impl Into<Vec<u8>>) -> Self {
        Self::Key(Zeroizing::new(key.into()))
    }

    /// Passphrase.
    pub fn passphrase(passphrase: impl Into<String>) -> Self {
        Self::Passphrase(Zeroizing::new(passphrase.into()))
    }

    /// True for low-entropy pre-keys that need the expensive KDF profile.
    pub fn is_low_entropy(&self) -> bool {
        matches!(self, Self::Passphrase(_))
    }
}

/// Named cipher, MAC and KDF selections for the manifest or an item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CryptoSuite {
    /// Registered cipher name.
    pub cipher: String,
    /// Block cipher mode, where the cipher needs one.
    pub mode: Option<String>,
    /// Padding scheme, where the mode needs one.
    pub padding: Option<String>,
    /// Cipher key size in bits.
    pub cipher_key_bits: u32,
    /// Registered MAC name.
    pub mac: String,
    /// MAC key size in bits.
    pub mac_key_bits: u32,
    /// Registered KDF name.
    pub kdf: String,
}

impl Default for CryptoSuite {
    fn default() -> Self {
        Self {
            cipher: obscur_crypto::registry::DEFAULT_CIPHER.to_string(),
            mode: None,
            padding: None,
            cipher_key_bits: 256,
            mac: obscur_crypto::registry::DEFAULT_MAC.to_string(),
            mac_key_bits: 256,
            kdf: obscur_crypto::registry::DEFAULT_KDF.to_string(),
        }
    }
}

impl CryptoSuite {
    /// AES-256 in CTR mode (byte-exact; valid for items too).
    pub fn aes256_ctr() -> Self {
        Self {
            cipher: "Aes".to_string(),
            mode: Some("Ctr".to_string()),
            padding: None,
            cipher_key_bits: 256,
            ..Self::default()
        }
    }

    /// AES-256-CBC with PKCS7 (manifest only; items need byte-exact
    /// transforms).
    pub fn aes256_cbc() -> Self {
        Self {
            cipher: "Aes".to_string(),
            mode: Some("Cbc".to_string()),
            padding: Some("Pkcs7".to_string()),
            cipher_key_bits: 256,
            ..Self::default()
        }
    }
}

/// Payload layout selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadLayout {
    /// Layout scheme.
    pub scheme: PayloadLayoutScheme,
    /// Chunk and padding ranges for the interleaving schemes; ignored by
    /// Simple.
    pub frameshift: FrameshiftConfig,
    /// Registered stream cipher backing the scheduling CSPRNG(s).
    pub prng: String,
}

impl Default for PayloadLayout {
    fn default() -> Self {
        Self {
            scheme: PayloadLayoutScheme::Frameshift,
            frameshift: FrameshiftConfig {
                min_chunk: 64,
                max_chunk: 512,
                min_shift: 4,
                max_shift: 16,
            },
            prng: obscur_crypto::registry::DEFAULT_PRNG.to_string(),
        }
    }
}

impl PayloadLayout {
    /// Simple layout: one contiguous run per item.
    pub fn simple() -> Self {
        Self { scheme: PayloadLayoutScheme::Simple, ..Self::default() }
    }

    /// Frameshift layout with the given ranges.
    pub fn frameshift(config: FrameshiftConfig) -> Self {
        Self { scheme: PayloadLayoutScheme::Frameshift, frameshift: config, ..Self::default() }
    }

    /// Fabric layout with the given ranges.
    pub fn fabric(config: FrameshiftConfig) -> Self {
        Self { scheme: PayloadLayoutScheme::Fabric, frameshift: config, ..Self::default() }
    }
}

/// Full write-side configuration.
#[derive(Debug)]
pub struct WriteOptions {
    /// How the manifest pre-key is established.
    pub manifest_key: ManifestWriteKey,
    /// Manifest crypto suite.
    pub suite: CryptoSuite,
    /// Payload layout and scheduling.
    pub layout: PayloadLayout,
    /// LZ4-frame compress the manifest plaintext before encryption.
    pub use_compression: bool,
    /// CSPRNG filler bytes between the ciphertext manifest and the payload
    /// region.
    pub payload_offset: u32,
    /// Emit a key confirmation record so readers can search candidate pools.
    /// Without one, readers must hold exactly one candidate.
    pub key_confirmation: bool,
}

impl WriteOptions {
    /// Defaults around the given manifest key: XSalsa20 + BLAKE2b + scrypt,
    /// Frameshift layout, compression on, confirmation on.
    pub fn new(manifest_key: ManifestWriteKey) -> Self {
        Self {
            manifest_key,
            suite: CryptoSuite::default(),
            layout: PayloadLayout::default(),
            use_compression: true,
            payload_offset: 0,
            key_confirmation: true,
        }
    }
}

/// How a payload item's working keys are established.
pub enum ItemKeyPolicy {
    /// Writer generates random keys and carries them in the manifest.
    Carried,
    /// Keys are derived at read time from this pre-key via per-item key
    /// confirmation and KDF; the manifest carries only the recipes.
    Derived {
        /// Item pre-key; readers must hold it in their candidate pool.
        pre_key: Zeroizing<Vec<u8>>,
    },
}

impl std::fmt::Debug for ItemKeyPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Carried => "Carried",
            Self::Derived { .. } => "Derived",
        };
        f.debug_tuple("ItemKeyPolicy").field(&label).finish()
    }
}

/// One payload item registration.
pub struct ItemSpec {
    /// Item kind.
    pub kind: PayloadItemKind,
    /// Relative path or logical name.
    pub path: String,
    /// Declared plaintext length; the source must yield exactly this many
    /// bytes.
    pub length: u64,
    /// Item content.
    pub(crate) source: ItemSource,
    /// Key policy.
    pub key_policy: ItemKeyPolicy,
    /// Item crypto suite (cipher and MAC; the KDF applies to derived keys).
    pub suite: CryptoSuite,
}

/// Item content: in-memory bytes or a lazily-opened stream.
pub(crate) enum ItemSource {
    /// In-memory content.
    Bytes(Vec<u8>),
    /// Factory invoked when the multiplexer first schedules the item, so
    /// open descriptors stay bounded by the schedule.
    Factory(Box<dyn FnOnce() -> std::io::Result<Box<dyn std::io::Read>>>),
}

impl std::fmt::Debug for ItemSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemSpec")
            .field("kind", &self.kind)
            .field("path", &self.path)
            .field("length", &self.length)
            .field("key_policy", &self.key_policy)
            .finish_non_exhaustive()
    }
}

impl ItemSpec {
    /// Item backed by in-memory bytes, with carried keys.
    pub fn from_bytes(kind: PayloadItemKind, path: impl Into<String>, content: Vec<u8>) -> Self {
        Self {
            kind,
            path: path.into(),
            length: content.len() as u64,
            source: ItemSource::Bytes(content),
            key_policy: ItemKeyPolicy::Carried,
            suite: CryptoSuite::default(),
        }
    }

    /// Item backed by a lazily-opened reader yielding exactly `length`
    /// bytes, with carried keys.
    pub fn from_reader(
        kind: PayloadItemKind,
        path: impl Into<String>,
        length: u64,
        open: impl FnOnce() -> std::io::Result<Box<dyn std::io::Read>> + 'static,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            length,
            source: ItemSource::Factory(Box::new(open)),
            key_policy: ItemKeyPolicy::Carried,
            suite: CryptoSuite::default(),
        }
    }

    /// Switch to read-time key derivation from the given pre-key.
    pub fn with_derived_key(mut self, pre_key: impl Into<Vec<u8>>) -> Self {
        self.key_policy = ItemKeyPolicy::Derived { pre_key: Zeroizing::new(pre_key.into()) };
        self
    }

    /// Override the item crypto suite.
    pub fn with_suite(mut self, suite: CryptoSuite) -> Self {
        self.suite = suite;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_name_registered_schemes() {
        let suite = CryptoSuite::default();
        assert!(obscur_crypto::registry::cipher_spec(&suite.cipher).is_ok());
        assert!(obscur_crypto::registry::mac_spec(&suite.mac).is_ok());
        assert!(obscur_crypto::registry::kdf_spec(&suite.kdf).is_ok());

        let layout = PayloadLayout::default();
        assert!(obscur_crypto::registry::cipher_spec(&layout.prng).is_ok());
        assert!(layout.frameshift.validate().is_ok());
    }

    #[test]
    fn passphrases_are_low_entropy() {
        assert!(ManifestWriteKey::passphrase("hunter2").is_low_entropy());
        assert!(!ManifestWriteKey::key(vec![0u8; 32]).is_low_entropy());
    }

    #[test]
    fn item_spec_from_bytes_declares_its_length() {
        let spec = ItemSpec::from_bytes(PayloadItemKind::Message, "hello.txt", vec![1, 2, 3]);
        assert_eq!(spec.length, 3);
        assert!(matches!(spec.key_policy, ItemKeyPolicy::Carried));

        let derived = spec.with_derived_key(vec![9u8; 32]);
        assert!(matches!(derived.key_policy, ItemKeyPolicy::Derived { .. }));
    }

    #[test]
    fn debug_never_prints_key_material() {
        let key = ManifestWriteKey::key(vec![0xEE; 32]);
        assert!(!format!("{key:?}").contains("EE"));

        let spec = ItemSpec::from_bytes(PayloadItemKind::File, "f", vec![0u8; 4])
            .with_derived_key(vec![0xEE; 32]);
        assert!(!format!("{spec:?}").contains("EE"));
    }
}
