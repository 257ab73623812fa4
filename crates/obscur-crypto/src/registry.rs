//! Primitive registry.
//!
//! Every cipher, mode, padding, MAC, hash, KDF, CSPRNG and curve the format
//! can name, with the size metadata needed to validate configurations before
//! any key material is handled. Polymorphism over primitives is tagged
//! variants plus these lookup tables; there is no trait hierarchy to extend.
//!
//! A name missing from its table is `UnknownScheme`; a size the table does
//! not allow is `ConfigurationInvalid`. Both are raised here so the engine
//! constructors can assume validated input.

use obscur_proto::{AuthenticationConfig, SymmetricCipherConfig};

use crate::errors::CryptoError;

/// Whether a cipher is a keystream generator or a block permutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherKind {
    /// Byte-exact keystream cipher.
    Stream,
    /// Block cipher; requires a mode, and a padding when the mode pads.
    Block,
}

/// Metadata for one registered cipher.
#[derive(Debug, Clone, Copy)]
pub struct CipherSpec {
    /// Canonical name.
    pub name: &'static str,
    /// Stream or block.
    pub kind: CipherKind,
    /// Allowed key sizes in bits.
    pub key_sizes_bits: &'static [u32],
    /// Required IV length in bytes.
    pub iv_size_bytes: usize,
    /// Block size in bytes; 1 for stream ciphers.
    pub block_size_bytes: usize,
}

/// Registered ciphers.
pub const CIPHERS: &[CipherSpec] = &[
    CipherSpec {
        name: "ChaCha",
        kind: CipherKind::Stream,
        key_sizes_bits: &[256],
        iv_size_bytes: 12,
        block_size_bytes: 1,
    },
    CipherSpec {
        name: "Salsa20",
        kind: CipherKind::Stream,
        key_sizes_bits: &[256],
        iv_size_bytes: 8,
        block_size_bytes: 1,
    },
    CipherSpec {
        name: "XSalsa20",
        kind: CipherKind::Stream,
        key_sizes_bits: &[256],
        iv_size_bytes: 24,
        block_size_bytes: 1,
    },
    CipherSpec {
        name: "Aes",
        kind: CipherKind::Block,
        key_sizes_bits: &[128, 192, 256],
        iv_size_bytes: 16,
        block_size_bytes: 16,
    },
];

/// Metadata for one registered block cipher mode.
#[derive(Debug, Clone, Copy)]
pub struct ModeSpec {
    /// Canonical name.
    pub name: &'static str,
    /// Whether ciphertext is padded to the block size.
    pub padded: bool,
}

/// Registered block cipher modes.
pub const MODES: &[ModeSpec] = &[
    ModeSpec { name: "Ctr", padded: false },
    ModeSpec { name: "Cbc", padded: true },
];

/// Registered padding schemes.
pub const PADDINGS: &[&str] = &["Pkcs7"];

/// Metadata for one registered MAC.
#[derive(Debug, Clone, Copy)]
pub struct MacSpec {
    /// Canonical name.
    pub name: &'static str,
    /// Output length in bytes.
    pub output_size_bytes: usize,
    /// Smallest accepted key in bytes.
    pub min_key_bytes: usize,
    /// Largest accepted key in bytes.
    pub max_key_bytes: usize,
}

/// Registered MACs.
pub const MACS: &[MacSpec] = &[
    MacSpec { name: "Hmac-Sha256", output_size_bytes: 32, min_key_bytes: 16, max_key_bytes: 128 },
    MacSpec { name: "Hmac-Sha512", output_size_bytes: 64, min_key_bytes: 16, max_key_bytes: 128 },
    MacSpec { name: "Blake2b-256", output_size_bytes: 32, min_key_bytes: 16, max_key_bytes: 64 },
    MacSpec { name: "Blake2b-512", output_size_bytes: 64, min_key_bytes: 16, max_key_bytes: 64 },
];

/// Registered hash functions (MAC-independent digests).
pub const HASHES: &[&str] = &["Sha256", "Sha512", "Blake2b-512"];

/// Registered KDFs.
pub const KDFS: &[&str] = &["Scrypt", "Pbkdf2"];

/// Registered EC curves for the UM1 hybrid scheme.
#[derive(Debug, Clone, Copy)]
pub struct CurveSpec {
    /// Canonical name.
    pub name: &'static str,
    /// Public key length in bytes.
    pub public_key_bytes: usize,
}

/// Registered curves.
pub const CURVES: &[CurveSpec] = &[CurveSpec { name: "Curve25519", public_key_bytes: 32 }];

/// Default manifest cipher.
pub const DEFAULT_CIPHER: &str = "XSalsa20";
/// Default manifest and item MAC.
pub const DEFAULT_MAC: &str = "Blake2b-256";
/// Default KDF.
pub const DEFAULT_KDF: &str = "Scrypt";
/// Default key confirmation function.
pub const DEFAULT_CONFIRMATION_MAC: &str = "Hmac-Sha256";
/// Default CSPRNG for payload scheduling.
pub const DEFAULT_PRNG: &str = "XSalsa20";

/// Look up a cipher by name.
pub fn cipher_spec(name: &str) -> Result<&'static CipherSpec, CryptoError> {
    CIPHERS.iter().find(|spec| spec.name == name).ok_or_else(|| CryptoError::UnknownScheme {
        kind: "cipher",
        name: name.to_string(),
    })
}

/// Look up a mode by name.
pub fn mode_spec(name: &str) -> Result<&'static ModeSpec, CryptoError> {
    MODES.iter().find(|spec| spec.name == name).ok_or_else(|| CryptoError::UnknownScheme {
        kind: "mode",
        name: name.to_string(),
    })
}

/// Look up a MAC by name.
pub fn mac_spec(name: &str) -> Result<&'static MacSpec, CryptoError> {
    MACS.iter().find(|spec| spec.name == name).ok_or_else(|| CryptoError::UnknownScheme {
        kind: "mac",
        name: name.to_string(),
    })
}

/// Look up a KDF by name.
pub fn kdf_spec(name: &str) -> Result<&'static str, CryptoError> {
    KDFS.iter().find(|&&kdf| kdf == name).copied().ok_or_else(|| CryptoError::UnknownScheme {
        kind: "kdf",
        name: name.to_string(),
    })
}

/// Look up a curve by name.
pub fn curve_spec(name: &str) -> Result<&'static CurveSpec, CryptoError> {
    CURVES.iter().find(|spec| spec.name == name).ok_or_else(|| CryptoError::UnknownScheme {
        kind: "curve",
        name: name.to_string(),
    })
}

/// Validate a full cipher configuration against the registry.
///
/// Checks the cipher name, key size, IV length, and the mode/padding rules:
/// stream ciphers take neither mode nor padding; block ciphers require a
/// registered mode, with a registered padding exactly when the mode pads.
pub fn validate_cipher_config(
    config: &SymmetricCipherConfig,
) -> Result<&'static CipherSpec, CryptoError> {
    let spec = cipher_spec(&config.cipher)?;

    if !spec.key_sizes_bits.contains(&config.key_size_bits) {
        return Err(CryptoError::ConfigurationInvalid {
            reason: format!(
                "key size {} bits not allowed for cipher {}",
                config.key_size_bits, spec.name
            ),
        });
    }

    if config.iv.len() != spec.iv_size_bytes {
        return Err(CryptoError::ConfigurationInvalid {
            reason: format!(
                "iv length {} invalid for cipher {} (expected {})",
                config.iv.len(),
                spec.name,
                spec.iv_size_bytes
            ),
        });
    }

    match spec.kind {
        CipherKind::Stream => {
            if config.mode.is_some() || config.padding.is_some() {
                return Err(CryptoError::ConfigurationInvalid {
                    reason: format!("stream cipher {} takes no mode or padding", spec.name),
                });
            }
        },
        CipherKind::Block => {
            let mode_name = config.mode.as_deref().ok_or_else(|| {
                CryptoError::ConfigurationInvalid {
                    reason: format!("block cipher {} requires a mode", spec.name),
                }
            })?;
            let mode = mode_spec(mode_name)?;

            match (mode.padded, config.padding.as_deref()) {
                (true, Some(padding)) => {
                    if !PADDINGS.contains(&padding) {
                        return Err(CryptoError::UnknownScheme {
                            kind: "padding",
                            name: padding.to_string(),
                        });
                    }
                },
                (true, None) => {
                    return Err(CryptoError::ConfigurationInvalid {
                        reason: format!("mode {mode_name} requires a padding scheme"),
                    });
                },
                (false, Some(_)) => {
                    return Err(CryptoError::ConfigurationInvalid {
                        reason: format!("mode {mode_name} takes no padding"),
                    });
                },
                (false, None) => {},
            }
        },
    }

    Ok(spec)
}

/// Validate an authentication configuration and its key size.
pub fn validate_auth_config(
    config: &AuthenticationConfig,
) -> Result<&'static MacSpec, CryptoError> {
    let spec = mac_spec(&config.scheme)?;
    let key_bytes = (config.key_size_bits as usize) / 8;

    if config.key_size_bits % 8 != 0
        || key_bytes < spec.min_key_bytes
        || key_bytes > spec.max_key_bytes
    {
        return Err(CryptoError::ConfigurationInvalid {
            reason: format!(
                "key size {} bits not allowed for mac {}",
                config.key_size_bits, spec.name
            ),
        });
    }

    Ok(spec)
}

/// True if the configuration is a byte-exact transform (stream cipher or an
/// unpadded block mode), as required for payload items.
pub fn is_byte_exact(config: &SymmetricCipherConfig) -> Result<bool, CryptoError> {
    let spec = validate_cipher_config(config)?;
    Ok(match spec.kind {
        CipherKind::Stream => true,
        CipherKind::Block => {
            let mode_name = config.mode.as_deref().unwrap_or_default();
            !mode_spec(mode_name)?.padded
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_config() -> SymmetricCipherConfig {
        SymmetricCipherConfig {
            cipher: "XSalsa20".to_string(),
            mode: None,
            padding: None,
            key_size_bits: 256,
            iv: vec![0u8; 24],
        }
    }

    fn cbc_config() -> SymmetricCipherConfig {
        SymmetricCipherConfig {
            cipher: "Aes".to_string(),
            mode: Some("Cbc".to_string()),
            padding: Some("Pkcs7".to_string()),
            key_size_bits: 256,
            iv: vec![0u8; 16],
        }
    }

    #[test]
    fn known_configs_validate() {
        assert_eq!(validate_cipher_config(&stream_config()).unwrap().name, "XSalsa20");
        assert_eq!(validate_cipher_config(&cbc_config()).unwrap().name, "Aes");
    }

    #[test]
    fn unknown_cipher_name() {
        let mut config = stream_config();
        config.cipher = "Rot13".to_string();
        assert!(matches!(
            validate_cipher_config(&config),
            Err(CryptoError::UnknownScheme { kind: "cipher", .. })
        ));
    }

    #[test]
    fn wrong_key_size_is_invalid() {
        let mut config = stream_config();
        config.key_size_bits = 128;
        assert!(matches!(
            validate_cipher_config(&config),
            Err(CryptoError::ConfigurationInvalid { .. })
        ));
    }

    #[test]
    fn wrong_iv_length_is_invalid() {
        let mut config = stream_config();
        config.iv = vec![0u8; 8];
        assert!(matches!(
            validate_cipher_config(&config),
            Err(CryptoError::ConfigurationInvalid { .. })
        ));
    }

    #[test]
    fn stream_cipher_rejects_mode() {
        let mut config = stream_config();
        config.mode = Some("Ctr".to_string());
        assert!(validate_cipher_config(&config).is_err());
    }

    #[test]
    fn block_cipher_requires_mode() {
        let mut config = cbc_config();
        config.mode = None;
        config.padding = None;
        assert!(validate_cipher_config(&config).is_err());
    }

    #[test]
    fn cbc_requires_padding_and_ctr_rejects_it() {
        let mut config = cbc_config();
        config.padding = None;
        assert!(validate_cipher_config(&config).is_err());

        let mut config = cbc_config();
        config.mode = Some("Ctr".to_string());
        assert!(validate_cipher_config(&config).is_err());
    }

    #[test]
    fn unknown_padding_name() {
        let mut config = cbc_config();
        config.padding = Some("Zeros".to_string());
        assert!(matches!(
            validate_cipher_config(&config),
            Err(CryptoError::UnknownScheme { kind: "padding", .. })
        ));
    }

    #[test]
    fn byte_exactness() {
        assert!(is_byte_exact(&stream_config()).unwrap());
        assert!(!is_byte_exact(&cbc_config()).unwrap());

        let ctr = SymmetricCipherConfig {
            cipher: "Aes".to_string(),
            mode: Some("Ctr".to_string()),
            padding: None,
            key_size_bits: 256,
            iv: vec![0u8; 16],
        };
        assert!(is_byte_exact(&ctr).unwrap());
    }

    #[test]
    fn mac_key_sizes_are_bounded() {
        let good = AuthenticationConfig {
            scheme: "Blake2b-256".to_string(),
            key_size_bits: 256,
            salt: Vec::new(),
        };
        assert_eq!(validate_auth_config(&good).unwrap().output_size_bytes, 32);

        let too_small = AuthenticationConfig { key_size_bits: 64, ..good.clone() };
        assert!(validate_auth_config(&too_small).is_err());

        let too_large = AuthenticationConfig { key_size_bits: 1024, ..good.clone() };
        assert!(validate_auth_config(&too_large).is_err());

        let unknown = AuthenticationConfig { scheme: "Crc32".to_string(), ..good };
        assert!(matches!(
            validate_auth_config(&unknown),
            Err(CryptoError::UnknownScheme { kind: "mac", .. })
        ));
    }

    #[test]
    fn lookups_cover_the_tables() {
        for spec in CIPHERS {
            assert_eq!(cipher_spec(spec.name).unwrap().name, spec.name);
        }
        for spec in MACS {
            assert_eq!(mac_spec(spec.name).unwrap().name, spec.name);
        }
        assert!(kdf_spec("Scrypt").is_ok());
        assert!(kdf_spec("Pbkdf2").is_ok());
        assert!(kdf_spec("Argon2").is_err());
        assert_eq!(curve_spec("Curve25519").unwrap().public_key_bytes, 32);
        assert!(curve_spec("secp256k1").is_err());
    }
}
