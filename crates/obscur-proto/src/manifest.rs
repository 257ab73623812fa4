//! Manifest and payload item DTOs.
//!
//! The manifest is the encrypted table of contents: it names every payload
//! item, carries (or describes how to derive) each item's keys, and pins the
//! multiplexing schedule through the payload configuration. Both sides seed
//! identical CSPRNGs from that configuration, so the writer's interleaving
//! is replayed bit-for-bit by the reader.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::{
    AuthenticationConfig, KeyConfirmationConfig, KeyDerivationConfig, SymmetricCipherConfig,
};
use crate::errors::FormatError;

/// Payload layout policy names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadLayoutScheme {
    /// One contiguous run per item, in CSPRNG-permuted order.
    Simple,
    /// Interleaved chunks with CSPRNG padding stripes between turns.
    Frameshift,
    /// Like Frameshift, with a second CSPRNG driving the padding stripes.
    Fabric,
}

impl PayloadLayoutScheme {
    /// Whether this scheme requires a secondary CSPRNG.
    pub fn needs_secondary_prng(self) -> bool {
        matches!(self, Self::Fabric)
    }
}

/// Seed material for one deterministic CSPRNG.
///
/// `name` must be a registered stream cipher; the generator is that cipher's
/// keystream. Both key and IV are chosen by the writer and carried here (the
/// whole record rides inside the encrypted manifest).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrngConfig {
    /// Registered stream cipher name.
    pub name: String,
    /// Cipher key seeding the generator.
    pub key: Vec<u8>,
    /// Cipher IV seeding the generator.
    pub iv: Vec<u8>,
}

/// Chunk and padding ranges for the interleaving schemes.
///
/// All bounds are inclusive. Used by both Frameshift and Fabric; Simple
/// carries no scheme config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameshiftConfig {
    /// Smallest chunk transferred in one turn.
    pub min_chunk: u32,
    /// Largest chunk transferred in one turn.
    pub max_chunk: u32,
    /// Smallest padding stripe between turns.
    pub min_shift: u32,
    /// Largest padding stripe between turns.
    pub max_shift: u32,
}

impl FrameshiftConfig {
    /// Serialize as the manifest's `scheme_config` bytes.
    pub fn encode(&self) -> Result<Vec<u8>, FormatError> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(self, &mut out).map_err(|err| FormatError::Serialization {
            context: "layout scheme config",
            detail: err.to_string(),
        })?;
        Ok(out)
    }

    /// Decode from the manifest's `scheme_config` bytes.
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        ciborium::de::from_reader(bytes)
            .map_err(|_| FormatError::Malformed { context: "layout scheme config" })
    }

    /// Ranges must be ordered and chunks non-empty.
    pub fn validate(&self) -> Result<(), FormatError> {
        if self.min_chunk == 0
            || self.min_chunk > self.max_chunk
            || self.min_shift > self.max_shift
        {
            return Err(FormatError::Malformed { context: "layout scheme config" });
        }
        Ok(())
    }
}

/// How the payload region is laid out and seeded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadConfiguration {
    /// Layout policy.
    pub scheme: PayloadLayoutScheme,
    /// Primary CSPRNG: item selection, chunk sizes, offset filler and (for
    /// Simple/Frameshift) padding.
    pub primary_prng: PrngConfig,
    /// Secondary CSPRNG: padding stripes, Fabric only.
    pub secondary_prng: Option<PrngConfig>,
    /// CSPRNG filler bytes between the ciphertext manifest and the payload
    /// region.
    pub payload_offset: u32,
    /// Serialized scheme-specific configuration ([`FrameshiftConfig`] for the
    /// interleaving schemes, empty for Simple).
    pub scheme_config: Vec<u8>,
}

/// What a payload item is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayloadItemKind {
    /// Free-standing message bytes.
    Message,
    /// File contents with a relative path.
    File,
    /// A key-management action carried in-band.
    KeyAction,
}

impl PayloadItemKind {
    /// Canonical single-byte discriminant used in associated data.
    pub fn discriminant(self) -> u8 {
        match self {
            Self::Message => 0,
            Self::File => 1,
            Self::KeyAction => 2,
        }
    }
}

/// One payload item: identity, metadata, and key material or the recipe to
/// derive it.
///
/// # Invariants
///
/// - `identifier` is unique within a manifest.
/// - Either both `cipher_key` and `authentication_key` are carried
///   (non-empty), or both are empty and `key_derivation` plus
///   `key_confirmation` describe how the reader derives them from a
///   candidate pre-key. Never mixed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadItem {
    /// Unique identifier; also the multiplexer's deterministic ordering key.
    pub identifier: Uuid,
    /// Item kind.
    pub kind: PayloadItemKind,
    /// Relative path (or logical name for messages).
    pub path: String,
    /// Source length in bytes as registered by the caller.
    pub external_length: u64,
    /// Plaintext length as seen by the multiplexer.
    pub internal_length: u64,
    /// Item cipher; must be a byte-exact transform (stream cipher or CTR).
    pub cipher: SymmetricCipherConfig,
    /// Item authenticator.
    pub authentication: AuthenticationConfig,
    /// Carried cipher key; empty when the key is derived at read time.
    pub cipher_key: Vec<u8>,
    /// Carried MAC key; empty when the key is derived at read time.
    pub authentication_key: Vec<u8>,
    /// Pre-key stretching recipe for derived-key items.
    pub key_derivation: Option<KeyDerivationConfig>,
    /// Confirmation recipe identifying the item's pre-key in a candidate
    /// pool.
    pub key_confirmation: Option<KeyConfirmationConfig>,
    /// Confirmation output over the correct pre-key.
    pub key_confirmation_output: Vec<u8>,
    /// Item authenticator output, filled during write after the payload
    /// region is multiplexed.
    pub authentication_output: Vec<u8>,
}

impl PayloadItem {
    /// True when keys are derived at read time rather than carried.
    pub fn uses_derived_keys(&self) -> bool {
        self.cipher_key.is_empty()
    }

    /// Check the carried-or-derived invariant.
    pub fn validate_key_material(&self) -> Result<(), FormatError> {
        let carried = !self.cipher_key.is_empty() && !self.authentication_key.is_empty();
        let derived = self.cipher_key.is_empty()
            && self.authentication_key.is_empty()
            && self.key_derivation.is_some()
            && self.key_confirmation.is_some();
        if carried == derived {
            return Err(FormatError::Malformed { context: "payload item key material" });
        }
        Ok(())
    }
}

/// The encrypted table of contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Multiplexing layout and seeds.
    pub payload_configuration: PayloadConfiguration,
    /// Items in registration order. Scheduling order is by identifier, not
    /// by position.
    pub payload_items: Vec<PayloadItem>,
}

impl Manifest {
    /// Serialize to the plaintext that gets (compressed and) encrypted.
    pub fn encode(&self) -> Result<Vec<u8>, FormatError> {
        let mut out = Vec::new();
        ciborium::ser::into_writer(self, &mut out).map_err(|err| FormatError::Serialization {
            context: "manifest",
            detail: err.to_string(),
        })?;
        Ok(out)
    }

    /// Decode from decrypted (and decompressed) plaintext.
    pub fn decode(bytes: &[u8]) -> Result<Self, FormatError> {
        let manifest: Self = ciborium::de::from_reader(bytes)
            .map_err(|_| FormatError::Malformed { context: "manifest" })?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Structural validation: unique identifiers, coherent key material,
    /// secondary PRNG present exactly when the scheme needs it.
    pub fn validate(&self) -> Result<(), FormatError> {
        let mut seen = std::collections::HashSet::with_capacity(self.payload_items.len());
        for item in &self.payload_items {
            if !seen.insert(item.identifier) {
                return Err(FormatError::Malformed { context: "duplicate item identifier" });
            }
            item.validate_key_material()?;
        }

        if self.payload_configuration.scheme.needs_secondary_prng()
            && self.payload_configuration.secondary_prng.is_none()
        {
            return Err(FormatError::Malformed { context: "missing secondary prng" });
        }

        Ok(())
    }

    /// Item indices in deterministic scheduling order (by identifier).
    pub fn scheduling_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.payload_items.len()).collect();
        order.sort_by_key(|&idx| self.payload_items[idx].identifier);
        order
    }
}
