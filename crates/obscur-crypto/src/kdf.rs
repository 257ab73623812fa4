//! Pre-key stretching.
//!
//! A pre-key (shared symmetric secret or UM1 agreement output) is stretched
//! into a single byte string of exactly cipher-key-length plus
//! mac-key-length, then split at the cipher-key boundary. The split is
//! deterministic: cipher key first, MAC key second.
//!
//! Decoding always honours the exact numeric parameters carried in the
//! [`KeyDerivationConfig`]; the defaults below only steer what writers emit.
//! Scrypt defaults differ by pre-key provenance: passphrases get the
//! expensive profile, high-entropy keys the cheap one (the entropy is
//! already there; the KDF only separates the key lanes).

use obscur_proto::{KeyDerivationConfig, Pbkdf2Params, ScryptParams};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::errors::CryptoError;
use crate::registry;

/// Scrypt profile for low-entropy passphrases.
pub const SCRYPT_PASSPHRASE_PARAMS: ScryptParams = ScryptParams { log_n: 14, r: 8, p: 1 };

/// Scrypt profile for high-entropy pre-keys.
pub const SCRYPT_KEY_PARAMS: ScryptParams = ScryptParams { log_n: 10, r: 8, p: 1 };

/// Default PBKDF2 iteration count for writers.
pub const PBKDF2_DEFAULT_PARAMS: Pbkdf2Params = Pbkdf2Params { iterations: 65536 };

/// A derived (cipher key, MAC key) pair; both wiped on drop.
pub struct WorkingKeys {
    /// Cipher working key.
    pub cipher_key: Zeroizing<Vec<u8>>,
    /// MAC working key.
    pub mac_key: Zeroizing<Vec<u8>>,
}

/// Stretch `pre_key` into `len` bytes per the configured KDF.
pub fn derive_bytes(
    pre_key: &[u8],
    config: &KeyDerivationConfig,
    len: usize,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    registry::kdf_spec(&config.scheme)?;
    let mut output = Zeroizing::new(vec![0u8; len]);

    match config.scheme.as_str() {
        "Scrypt" => {
            let params = config.scrypt_params().map_err(|_| {
                CryptoError::ConfigurationInvalid { reason: "undecodable scrypt params".into() }
            })?;
            let params =
                scrypt::Params::new(params.log_n, params.r, params.p, len).map_err(|_| {
                    CryptoError::ConfigurationInvalid {
                        reason: format!(
                            "scrypt params out of range: log_n={} r={} p={}",
                            params.log_n, params.r, params.p
                        ),
                    }
                })?;
            scrypt::scrypt(pre_key, &config.salt, &params, &mut output)
                .map_err(|_| CryptoError::Internal { context: "scrypt derivation" })?;
        },
        "Pbkdf2" => {
            let params = config.pbkdf2_params().map_err(|_| {
                CryptoError::ConfigurationInvalid { reason: "undecodable pbkdf2 params".into() }
            })?;
            if params.iterations == 0 {
                return Err(CryptoError::ConfigurationInvalid {
                    reason: "pbkdf2 iteration count of zero".into(),
                });
            }
            pbkdf2::pbkdf2_hmac::<Sha256>(pre_key, &config.salt, params.iterations, &mut output);
        },
        // kdf_spec above keeps the registry and this match in lockstep.
        other => {
            return Err(CryptoError::UnknownScheme { kind: "kdf", name: other.to_string() });
        },
    }

    Ok(output)
}

/// Stretch `pre_key` into a cipher/MAC working key pair.
pub fn derive_working_keys(
    pre_key: &[u8],
    config: &KeyDerivationConfig,
    cipher_key_bytes: usize,
    mac_key_bytes: usize,
) -> Result<WorkingKeys, CryptoError> {
    let stretched = derive_bytes(pre_key, config, cipher_key_bytes + mac_key_bytes)?;
    let cipher_key = Zeroizing::new(stretched[..cipher_key_bytes].to_vec());
    let mac_key = Zeroizing::new(stretched[cipher_key_bytes..].to_vec());
    Ok(WorkingKeys { cipher_key, mac_key })
}
