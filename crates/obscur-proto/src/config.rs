//! Crypto configuration DTOs.
//!
//! These records describe, by name and parameter, which external primitives
//! protect a manifest or a payload item. Names are resolved against the
//! registry in the crypto layer; this layer only defines the wire shape.
//!
//! The manifest crypto config doubles as associated data: an
//! "authenticatible clone" of it — identical except that
//! `authentication_output` is empty — is fed to the manifest authenticator,
//! binding the whole configuration to the ciphertext MAC.

use serde::{Deserialize, Serialize};

use crate::errors::FormatError;
use crate::header::ManifestCryptoScheme;

/// Symmetric cipher selection for a manifest or payload item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymmetricCipherConfig {
    /// Registered cipher name, e.g. `"XSalsa20"` or `"Aes"`.
    pub cipher: String,
    /// Block cipher mode, e.g. `"Ctr"` or `"Cbc"`. Absent for stream ciphers.
    pub mode: Option<String>,
    /// Padding scheme for padded modes, e.g. `"Pkcs7"`. Absent otherwise.
    pub padding: Option<String>,
    /// Key size in bits; must be allowed by the registry for `cipher`.
    pub key_size_bits: u32,
    /// Initialisation vector / nonce, sized per the registry.
    pub iv: Vec<u8>,
}

/// MAC selection and salt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticationConfig {
    /// Registered MAC name, e.g. `"Blake2b-256"` or `"Hmac-Sha256"`.
    pub scheme: String,
    /// MAC key size in bits.
    pub key_size_bits: u32,
    /// Salt folded into the authenticator at initialisation; may be empty.
    pub salt: Vec<u8>,
}

/// Scrypt cost parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScryptParams {
    /// CPU/memory cost exponent; N = 2^log_n.
    pub log_n: u8,
    /// Block size factor.
    pub r: u32,
    /// Parallelisation factor.
    pub p: u32,
}

/// PBKDF2 cost parameters (HMAC-SHA256).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pbkdf2Params {
    /// Iteration count.
    pub iterations: u32,
}

/// KDF selection stretching a pre-key into working keys.
///
/// `config` is the CBOR-serialized parameter record for the named function;
/// decoders must respect the exact numeric parameters found here rather than
/// any defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyDerivationConfig {
    /// Registered KDF name: `"Scrypt"` or `"Pbkdf2"`.
    pub scheme: String,
    /// Derivation salt.
    pub salt: Vec<u8>,
    /// CBOR-serialized [`ScryptParams`] or [`Pbkdf2Params`].
    pub config: Vec<u8>,
}

impl KeyDerivationConfig {
    /// Build a scrypt configuration with serialized parameters.
    pub fn scrypt(salt: Vec<u8>, params: ScryptParams) -> Result<Self, FormatError> {
        let mut config = Vec::new();
        ciborium::ser::into_writer(&params, &mut config).map_err(|err| {
            FormatError::Serialization { context: "scrypt params", detail: err.to_string() }
        })?;
        Ok(Self { scheme: "Scrypt".to_string(), salt, config })
    }

    /// Build a PBKDF2 configuration with serialized parameters.
    pub fn pbkdf2(salt: Vec<u8>, params: Pbkdf2Params) -> Result<Self, FormatError> {
        let mut config = Vec::new();
        ciborium::ser::into_writer(&params, &mut config).map_err(|err| {
            FormatError::Serialization { context: "pbkdf2 params", detail: err.to_string() }
        })?;
        Ok(Self { scheme: "Pbkdf2".to_string(), salt, config })
    }

    /// Decode the parameter record as [`ScryptParams`].
    pub fn scrypt_params(&self) -> Result<ScryptParams, FormatError> {
        ciborium::de::from_reader(self.config.as_slice())
            .map_err(|_| FormatError::Malformed { context: "scrypt params" })
    }

    /// Decode the parameter record as [`Pbkdf2Params`].
    pub fn pbkdf2_params(&self) -> Result<Pbkdf2Params, FormatError> {
        ciborium::de::from_reader(self.config.as_slice())
            .map_err(|_| FormatError::Malformed { context: "pbkdf2 params" })
    }
}

/// Key confirmation: a keyed function whose output identifies the matching
/// candidate key without decrypting anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyConfirmationConfig {
    /// Registered MAC name used as the keyed function.
    pub scheme: String,
    /// Bytes the keyed function is run over.
    pub salt: Vec<u8>,
}

/// Fields common to both manifest crypto scheme variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestCryptoPolicy {
    /// Manifest cipher.
    pub cipher: SymmetricCipherConfig,
    /// Manifest authenticator.
    pub authentication: AuthenticationConfig,
    /// Pre-key stretching.
    pub key_derivation: KeyDerivationConfig,
    /// Key confirmation; absent means the reader must hold exactly one
    /// candidate.
    pub key_confirmation: Option<KeyConfirmationConfig>,
    /// Output of the confirmation function over the correct pre-key.
    pub key_confirmation_output: Vec<u8>,
    /// Expected manifest authenticator output; cleared in the
    /// authenticatible clone.
    pub authentication_output: Vec<u8>,
}

/// Symmetric-only manifest crypto configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymmetricManifestConfig {
    /// Cipher, MAC, KDF and confirmation selections.
    pub policy: ManifestCryptoPolicy,
}

/// UM1-hybrid manifest crypto configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Um1ManifestConfig {
    /// Cipher, MAC, KDF and confirmation selections.
    pub policy: ManifestCryptoPolicy,
    /// Single-use EC public key; its curve must match the recipient's
    /// long-term key curve.
    pub ephemeral_key: Vec<u8>,
}

/// Scheme-tagged manifest crypto configuration.
///
/// The tag itself lives in the package header (`ManifestCryptoScheme`); the
/// wire form of this record is the bare variant, selected by that tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestCryptoConfig {
    /// Shared-key variant.
    Symmetric(SymmetricManifestConfig),
    /// Hybrid EC variant.
    Um1(Um1ManifestConfig),
}

impl ManifestCryptoConfig {
    /// Scheme tag matching this variant.
    pub fn scheme(&self) -> ManifestCryptoScheme {
        match self {
            Self::Symmetric(_) => ManifestCryptoScheme::SymmetricOnly,
            Self::Um1(_) => ManifestCryptoScheme::Um1Hybrid,
        }
    }

    /// Shared policy fields.
    pub fn policy(&self) -> &ManifestCryptoPolicy {
        match self {
            Self::Symmetric(cfg) => &cfg.policy,
            Self::Um1(cfg) => &cfg.policy,
        }
    }

    /// Mutable shared policy fields.
    pub fn policy_mut(&mut self) -> &mut ManifestCryptoPolicy {
        match self {
            Self::Symmetric(cfg) => &mut cfg.policy,
            Self::Um1(cfg) => &mut cfg.policy,
        }
    }

    /// Serialize to the `scheme_config` bytes carried in the header.
    pub fn encode(&self) -> Result<Vec<u8>, FormatError> {
        let mut out = Vec::new();
        let result = match self {
            Self::Symmetric(cfg) => ciborium::ser::into_writer(cfg, &mut out),
            Self::Um1(cfg) => ciborium::ser::into_writer(cfg, &mut out),
        };
        result.map_err(|err| FormatError::Serialization {
            context: "manifest crypto config",
            detail: err.to_string(),
        })?;
        Ok(out)
    }

    /// Decode the `scheme_config` bytes for the scheme named in the header.
    pub fn decode(scheme: ManifestCryptoScheme, bytes: &[u8]) -> Result<Self, FormatError> {
        match scheme {
            ManifestCryptoScheme::SymmetricOnly => ciborium::de::from_reader(bytes)
                .map(Self::Symmetric)
                .map_err(|_| FormatError::Malformed { context: "symmetric manifest config" }),
            ManifestCryptoScheme::Um1Hybrid => ciborium::de::from_reader(bytes)
                .map(Self::Um1)
                .map_err(|_| FormatError::Malformed { context: "um1 manifest config" }),
        }
    }

    /// The associated-data form: identical to the wire form except that
    /// `authentication_output` is empty, so verifier and writer reproduce the
    /// same bytes.
    pub fn authenticatible_clone(&self) -> Self {
        let mut clone = self.clone();
        clone.policy_mut().authentication_output = Vec::new();
        clone
    }
}
