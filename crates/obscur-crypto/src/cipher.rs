//! Symmetric cipher engines.
//!
//! Tagged-variant dispatch over the registered ciphers. Two shapes exist:
//! byte-exact keystream transforms (stream ciphers and AES-CTR), where
//! encryption and decryption are the same keystream XOR, and padded block
//! transforms (AES-CBC with PKCS7), which only the manifest path may use.
//!
//! Constructors take a registry-validated [`SymmetricCipherConfig`] plus the
//! working key; a key whose length disagrees with the config is rejected
//! before any primitive is initialised.

use aes::{Aes128, Aes192, Aes256};
use chacha20::ChaCha20;
use cipher::generic_array::GenericArray;
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, StreamCipher};
use obscur_proto::SymmetricCipherConfig;
use salsa20::{Salsa20, XSalsa20};

use crate::errors::CryptoError;
use crate::registry;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type Aes192Ctr = ctr::Ctr128BE<Aes192>;
type Aes256Ctr = ctr::Ctr128BE<Aes256>;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes192CbcEnc = cbc::Encryptor<Aes192>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes192CbcDec = cbc::Decryptor<Aes192>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// AES block size in bytes; the only registered block cipher.
pub const BLOCK_SIZE: usize = 16;

/// A byte-exact keystream transform.
///
/// Applying the keystream twice with the same state round-trips, so one type
/// serves both directions.
pub enum StreamTransform {
    /// ChaCha20 (IETF nonce).
    ChaCha(Box<ChaCha20>),
    /// Salsa20/20.
    Salsa20(Box<Salsa20>),
    /// XSalsa20 (extended nonce).
    XSalsa20(Box<XSalsa20>),
    /// AES-128 in CTR mode.
    Aes128Ctr(Box<Aes128Ctr>),
    /// AES-192 in CTR mode.
    Aes192Ctr(Box<Aes192Ctr>),
    /// AES-256 in CTR mode.
    Aes256Ctr(Box<Aes256Ctr>),
}

impl std::fmt::Debug for StreamTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ChaCha(_) => "ChaCha",
            Self::Salsa20(_) => "Salsa20",
            Self::XSalsa20(_) => "XSalsa20",
            Self::Aes128Ctr(_) => "Aes128Ctr",
            Self::Aes192Ctr(_) => "Aes192Ctr",
            Self::Aes256Ctr(_) => "Aes256Ctr",
        };
        f.debug_tuple("StreamTransform").field(&name).finish()
    }
}

fn key_matches_config(config: &SymmetricCipherConfig, key: &[u8]) -> Result<(), CryptoError> {
    if key.len() * 8 != config.key_size_bits as usize {
        return Err(CryptoError::ConfigurationInvalid {
            reason: format!(
                "working key is {} bytes but config declares {} bits",
                key.len(),
                config.key_size_bits
            ),
        });
    }
    Ok(())
}

fn init_failure(_: cipher::InvalidLength) -> CryptoError {
    // Registry validation fixes key and IV lengths first, so reaching this
    // means the registry table and the primitive disagree.
    CryptoError::Internal { context: "cipher initialisation" }
}

impl StreamTransform {
    /// Build from a validated config and working key.
    ///
    /// # Errors
    ///
    /// `ConfigurationInvalid` if the config is not a byte-exact transform or
    /// the key length disagrees with it.
    pub fn from_config(
        config: &SymmetricCipherConfig,
        key: &[u8],
    ) -> Result<Self, CryptoError> {
        registry::validate_cipher_config(config)?;
        key_matches_config(config, key)?;
        Self::from_raw_parts(&config.cipher, config.mode.as_deref(), key, &config.iv)
    }

    /// Build a bare keystream generator by cipher name (CSPRNG seeding path).
    ///
    /// Only stream ciphers are accepted here; modes are not in play.
    pub fn from_raw(name: &str, key: &[u8], iv: &[u8]) -> Result<Self, CryptoError> {
        let spec = registry::cipher_spec(name)?;
        if spec.kind != registry::CipherKind::Stream {
            return Err(CryptoError::ConfigurationInvalid {
                reason: format!("{name} is not a stream cipher"),
            });
        }
        if key.len() * 8 != spec.key_sizes_bits[0] as usize || iv.len() != spec.iv_size_bytes {
            return Err(CryptoError::ConfigurationInvalid {
                reason: format!("seed sizes invalid for {name}"),
            });
        }
        Self::from_raw_parts(name, None, key, iv)
    }

    fn from_raw_parts(
        name: &str,
        mode: Option<&str>,
        key: &[u8],
        iv: &[u8],
    ) -> Result<Self, CryptoError> {
        match (name, mode) {
            ("ChaCha", None) => {
                Ok(Self::ChaCha(Box::new(ChaCha20::new_from_slices(key, iv).map_err(init_failure)?)))
            },
            ("Salsa20", None) => Ok(Self::Salsa20(Box::new(
                Salsa20::new_from_slices(key, iv).map_err(init_failure)?,
            ))),
            ("XSalsa20", None) => Ok(Self::XSalsa20(Box::new(
                XSalsa20::new_from_slices(key, iv).map_err(init_failure)?,
            ))),
            ("Aes", Some("Ctr")) => match key.len() {
                16 => Ok(Self::Aes128Ctr(Box::new(
                    Aes128Ctr::new_from_slices(key, iv).map_err(init_failure)?,
                ))),
                24 => Ok(Self::Aes192Ctr(Box::new(
                    Aes192Ctr::new_from_slices(key, iv).map_err(init_failure)?,
                ))),
                32 => Ok(Self::Aes256Ctr(Box::new(
                    Aes256Ctr::new_from_slices(key, iv).map_err(init_failure)?,
                ))),
                other => Err(CryptoError::ConfigurationInvalid {
                    reason: format!("aes key length {other} bytes"),
                }),
            },
            _ => Err(CryptoError::ConfigurationInvalid {
                reason: format!("{name} is not a byte-exact transform in this configuration"),
            }),
        }
    }

    /// XOR the keystream over `data` in place.
    pub fn apply(&mut self, data: &mut [u8]) -> Result<(), CryptoError> {
        let result = match self {
            Self::ChaCha(c) => c.try_apply_keystream(data),
            Self::Salsa20(c) => c.try_apply_keystream(data),
            Self::XSalsa20(c) => c.try_apply_keystream(data),
            Self::Aes128Ctr(c) => c.try_apply_keystream(data),
            Self::Aes192Ctr(c) => c.try_apply_keystream(data),
            Self::Aes256Ctr(c) => c.try_apply_keystream(data),
        };
        result.map_err(|_| CryptoError::Internal { context: "keystream application" })
    }
}

/// Padded block-mode encryptor (AES-CBC).
pub enum BlockEncryptor {
    /// AES-128-CBC.
    Aes128(Box<Aes128CbcEnc>),
    /// AES-192-CBC.
    Aes192(Box<Aes192CbcEnc>),
    /// AES-256-CBC.
    Aes256(Box<Aes256CbcEnc>),
}

impl BlockEncryptor {
    /// Encrypt one block in place.
    pub fn encrypt_block(&mut self, block: &mut [u8; BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(enc) => enc.encrypt_block_mut(block),
            Self::Aes192(enc) => enc.encrypt_block_mut(block),
            Self::Aes256(enc) => enc.encrypt_block_mut(block),
        }
    }
}

/// Padded block-mode decryptor (AES-CBC).
pub enum BlockDecryptor {
    /// AES-128-CBC.
    Aes128(Box<Aes128CbcDec>),
    /// AES-192-CBC.
    Aes192(Box<Aes192CbcDec>),
    /// AES-256-CBC.
    Aes256(Box<Aes256CbcDec>),
}

impl BlockDecryptor {
    /// Decrypt one block in place.
    pub fn decrypt_block(&mut self, block: &mut [u8; BLOCK_SIZE]) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(dec) => dec.decrypt_block_mut(block),
            Self::Aes192(dec) => dec.decrypt_block_mut(block),
            Self::Aes256(dec) => dec.decrypt_block_mut(block),
        }
    }
}

/// Encrypting engine for either cipher shape.
pub enum CipherEncryptor {
    /// Byte-exact keystream XOR.
    Stream(StreamTransform),
    /// Padded CBC; the write decorator buffers partial blocks and pads on
    /// finish.
    Block(BlockEncryptor),
}

impl CipherEncryptor {
    /// Build from a validated config and working key.
    pub fn from_config(config: &SymmetricCipherConfig, key: &[u8]) -> Result<Self, CryptoError> {
        let spec = registry::validate_cipher_config(config)?;
        key_matches_config(config, key)?;

        if spec.kind == registry::CipherKind::Stream
            || config.mode.as_deref() == Some("Ctr")
        {
            return Ok(Self::Stream(StreamTransform::from_raw_parts(
                &config.cipher,
                config.mode.as_deref(),
                key,
                &config.iv,
            )?));
        }

        let enc = match key.len() {
            16 => BlockEncryptor::Aes128(Box::new(
                Aes128CbcEnc::new_from_slices(key, &config.iv).map_err(init_failure)?,
            )),
            24 => BlockEncryptor::Aes192(Box::new(
                Aes192CbcEnc::new_from_slices(key, &config.iv).map_err(init_failure)?,
            )),
            32 => BlockEncryptor::Aes256(Box::new(
                Aes256CbcEnc::new_from_slices(key, &config.iv).map_err(init_failure)?,
            )),
            other => {
                return Err(CryptoError::ConfigurationInvalid {
                    reason: format!("aes key length {other} bytes"),
                });
            },
        };
        Ok(Self::Block(enc))
    }

    /// Block size of the underlying transform; 1 for byte-exact.
    pub fn block_size(&self) -> usize {
        match self {
            Self::Stream(_) => 1,
            Self::Block(_) => BLOCK_SIZE,
        }
    }
}

/// Decrypting engine for either cipher shape.
pub enum CipherDecryptor {
    /// Byte-exact keystream XOR.
    Stream(StreamTransform),
    /// Padded CBC; the read decorator withholds a trailing block window and
    /// strips padding at end of stream.
    Block(BlockDecryptor),
}

impl CipherDecryptor {
    /// Build from a validated config and working key.
    pub fn from_config(config: &SymmetricCipherConfig, key: &[u8]) -> Result<Self, CryptoError> {
        let spec = registry::validate_cipher_config(config)?;
        key_matches_config(config, key)?;

        if spec.kind == registry::CipherKind::Stream
            || config.mode.as_deref() == Some("Ctr")
        {
            return Ok(Self::Stream(StreamTransform::from_raw_parts(
                &config.cipher,
                config.mode.as_deref(),
                key,
                &config.iv,
            )?));
        }

        let dec = match key.len() {
            16 => BlockDecryptor::Aes128(Box::new(
                Aes128CbcDec::new_from_slices(key, &config.iv).map_err(init_failure)?,
            )),
            24 => BlockDecryptor::Aes192(Box::new(
                Aes192CbcDec::new_from_slices(key, &config.iv).map_err(init_failure)?,
            )),
            32 => BlockDecryptor::Aes256(Box::new(
                Aes256CbcDec::new_from_slices(key, &config.iv).map_err(init_failure)?,
            )),
            other => {
                return Err(CryptoError::ConfigurationInvalid {
                    reason: format!("aes key length {other} bytes"),
                });
            },
        };
        Ok(Self::Block(dec))
    }

    /// Block size of the underlying transform; 1 for byte-exact.
    pub fn block_size(&self) -> usize {
        match self {
            Self::Stream(_) => 1,
            Self::Block(_) => BLOCK_SIZE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xsalsa_config() -> SymmetricCipherConfig {
        SymmetricCipherConfig {
            cipher: "XSalsa20".to_string(),
            mode: None,
            padding: None,
            key_size_bits: 256,
            iv: vec![0x24; 24],
        }
    }

    fn ctr_config() -> SymmetricCipherConfig {
        SymmetricCipherConfig {
            cipher: "Aes".to_string(),
            mode: Some("Ctr".to_string()),
            padding: None,
            key_size_bits: 256,
            iv: vec![0x16; 16],
        }
    }

    #[test]
    fn keystream_round_trips() {
        let key = [0x42u8; 32];
        let mut plaintext = b"the quick brown fox jumps over the lazy dog".to_vec();
        let original = plaintext.clone();

        let mut enc = StreamTransform::from_config(&xsalsa_config(), &key).unwrap();
        enc.apply(&mut plaintext).unwrap();
        assert_ne!(plaintext, original);

        let mut dec = StreamTransform::from_config(&xsalsa_config(), &key).unwrap();
        dec.apply(&mut plaintext).unwrap();
        assert_eq!(plaintext, original);
    }

    #[test]
    fn keystream_is_position_dependent() {
        let key = [0x42u8; 32];
        let mut a = vec![0u8; 64];
        let mut b = vec![0u8; 64];

        let mut t = StreamTransform::from_config(&xsalsa_config(), &key).unwrap();
        t.apply(&mut a).unwrap();
        t.apply(&mut b).unwrap();

        assert_ne!(a, b, "successive keystream windows must differ");
    }

    #[test]
    fn ctr_round_trips_across_split_applications() {
        let key = [0x07u8; 32];
        let message = b"split into uneven chunks for the counter mode".to_vec();

        let mut enc = StreamTransform::from_config(&ctr_config(), &key).unwrap();
        let mut ciphertext = message.clone();
        let (head, tail) = ciphertext.split_at_mut(13);
        enc.apply(head).unwrap();
        enc.apply(tail).unwrap();

        let mut dec = StreamTransform::from_config(&ctr_config(), &key).unwrap();
        dec.apply(&mut ciphertext).unwrap();
        assert_eq!(ciphertext, message);
    }

    #[test]
    fn cbc_blocks_round_trip() {
        let key = [0x31u8; 32];
        let config = SymmetricCipherConfig {
            cipher: "Aes".to_string(),
            mode: Some("Cbc".to_string()),
            padding: Some("Pkcs7".to_string()),
            key_size_bits: 256,
            iv: vec![0x05; 16],
        };

        let mut block_a = *b"exactly 16 bytes";
        let mut block_b = *b"another 16 bytes";
        let (orig_a, orig_b) = (block_a, block_b);

        let CipherEncryptor::Block(mut enc) =
            CipherEncryptor::from_config(&config, &key).unwrap()
        else {
            unreachable!("cbc config must build a block encryptor");
        };
        enc.encrypt_block(&mut block_a);
        enc.encrypt_block(&mut block_b);
        assert_ne!(block_a, orig_a);

        let CipherDecryptor::Block(mut dec) =
            CipherDecryptor::from_config(&config, &key).unwrap()
        else {
            unreachable!("cbc config must build a block decryptor");
        };
        dec.decrypt_block(&mut block_a);
        dec.decrypt_block(&mut block_b);
        assert_eq!(block_a, orig_a);
        assert_eq!(block_b, orig_b);
    }

    #[test]
    fn key_length_must_match_config() {
        let short_key = [0u8; 16];
        assert!(matches!(
            StreamTransform::from_config(&xsalsa_config(), &short_key),
            Err(CryptoError::ConfigurationInvalid { .. })
        ));
    }

    #[test]
    fn raw_constructor_rejects_block_ciphers() {
        let result = StreamTransform::from_raw("Aes", &[0u8; 32], &[0u8; 16]);
        assert!(matches!(result, Err(CryptoError::ConfigurationInvalid { .. })));
    }

    #[test]
    fn raw_constructor_rejects_bad_seed_sizes() {
        assert!(StreamTransform::from_raw("XSalsa20", &[0u8; 16], &[0u8; 24]).is_err());
        assert!(StreamTransform::from_raw("XSalsa20", &[0u8; 32], &[0u8; 8]).is_err());
        assert!(StreamTransform::from_raw("Salsa20", &[0u8; 32], &[0u8; 8]).is_ok());
    }
}
