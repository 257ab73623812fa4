//! Keyed authenticators.
//!
//! Tagged-variant dispatch over the registered MACs. An authenticator is
//! created keyed, fed incrementally (ciphertext first, associated data
//! last), and consumed by finalisation. Output comparison is the caller's
//! job and must go through `obscur_codec::ct_eq`.

use blake2::Blake2bMac;
use blake2::digest::consts::{U32, U64};
use hmac::{Hmac, Mac};
use obscur_proto::AuthenticationConfig;
use sha2::{Sha256, Sha512};

use crate::errors::CryptoError;
use crate::registry;

type HmacSha256 = Hmac<Sha256>;
type HmacSha512 = Hmac<Sha512>;
type Blake2bMac256 = Blake2bMac<U32>;
type Blake2bMac512 = Blake2bMac<U64>;

/// A keyed authenticator over one of the registered MAC functions.
pub enum Authenticator {
    /// HMAC-SHA-256.
    HmacSha256(Box<HmacSha256>),
    /// HMAC-SHA-512.
    HmacSha512(Box<HmacSha512>),
    /// Keyed BLAKE2b, 256-bit output.
    Blake2b256(Box<Blake2bMac256>),
    /// Keyed BLAKE2b, 512-bit output.
    Blake2b512(Box<Blake2bMac512>),
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Authenticator").field(&self.scheme_name()).finish()
    }
}

impl Authenticator {
    /// Build from an authentication config and working key.
    ///
    /// The config's salt, when present, is folded in first so both sides
    /// agree on the authenticator's starting state.
    pub fn from_config(config: &AuthenticationConfig, key: &[u8]) -> Result<Self, CryptoError> {
        registry::validate_auth_config(config)?;
        if key.len() * 8 != config.key_size_bits as usize {
            return Err(CryptoError::ConfigurationInvalid {
                reason: format!(
                    "mac key is {} bytes but config declares {} bits",
                    key.len(),
                    config.key_size_bits
                ),
            });
        }

        let mut mac = Self::from_scheme(&config.scheme, key)?;
        if !config.salt.is_empty() {
            mac.update(&config.salt);
        }
        Ok(mac)
    }

    /// Build by scheme name with an arbitrary-length key.
    ///
    /// This is the key-confirmation path: candidate keys are whatever the
    /// caller holds, so only the primitive's own key bounds apply.
    pub fn from_scheme(scheme: &str, key: &[u8]) -> Result<Self, CryptoError> {
        registry::mac_spec(scheme)?;
        let invalid = |_| CryptoError::ConfigurationInvalid {
            reason: format!("key length {} not accepted by {scheme}", key.len()),
        };

        match scheme {
            "Hmac-Sha256" => {
                Ok(Self::HmacSha256(Box::new(HmacSha256::new_from_slice(key).map_err(invalid)?)))
            },
            "Hmac-Sha512" => {
                Ok(Self::HmacSha512(Box::new(HmacSha512::new_from_slice(key).map_err(invalid)?)))
            },
            "Blake2b-256" => {
                Ok(Self::Blake2b256(Box::new(Blake2bMac256::new_from_slice(key).map_err(invalid)?)))
            },
            "Blake2b-512" => {
                Ok(Self::Blake2b512(Box::new(Blake2bMac512::new_from_slice(key).map_err(invalid)?)))
            },
            other => {
                // mac_spec above covers the registry; a registered name
                // without a construction arm is a table bug.
                Err(CryptoError::UnknownScheme { kind: "mac", name: other.to_string() })
            },
        }
    }

    /// Canonical scheme name.
    pub fn scheme_name(&self) -> &'static str {
        match self {
            Self::HmacSha256(_) => "Hmac-Sha256",
            Self::HmacSha512(_) => "Hmac-Sha512",
            Self::Blake2b256(_) => "Blake2b-256",
            Self::Blake2b512(_) => "Blake2b-512",
        }
    }

    /// Output length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            Self::HmacSha256(_) | Self::Blake2b256(_) => 32,
            Self::HmacSha512(_) | Self::Blake2b512(_) => 64,
        }
    }

    /// Feed bytes into the authenticator.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::HmacSha256(mac) => mac.update(data),
            Self::HmacSha512(mac) => mac.update(data),
            Self::Blake2b256(mac) => mac.update(data),
            Self::Blake2b512(mac) => mac.update(data),
        }
    }

    /// Consume the authenticator and produce its output.
    pub fn finalize(self) -> Vec<u8> {
        match self {
            Self::HmacSha256(mac) => mac.finalize().into_bytes().to_vec(),
            Self::HmacSha512(mac) => mac.finalize().into_bytes().to_vec(),
            Self::Blake2b256(mac) => mac.finalize().into_bytes().to_vec(),
            Self::Blake2b512(mac) => mac.finalize().into_bytes().to_vec(),
        }
    }
}
