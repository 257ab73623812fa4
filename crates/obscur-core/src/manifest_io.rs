//! Manifest crypto engine.
//!
//! Sealing (write): establish the pre-key for the selected scheme, stretch
//! it into working keys, serialize (and optionally compress) the manifest,
//! run it through the encrypt-then-MAC decorator stack, authenticate the
//! associated data, and emit header tag, header DTO, obfuscated length
//! prefix and ciphertext in wire order.
//!
//! Opening (read) mirrors it exactly: parse and validate the header,
//! identify the pre-key among the provider's candidates via key
//! confirmation, derive working keys, de-obfuscate the length prefix,
//! decrypt-then-verify through the mirrored stack, and only then
//! decompress and decode the plaintext.
//!
//! Associated data order is part of the format: first the obfuscated
//! 4-byte length prefix exactly as it appears on the wire, then the CBOR
//! bytes of the authenticatible clone of the scheme config.

use std::io::{Read, Write};

use obscur_codec::{ct_eq, put_u32_le, read_u32_le, wipe_vec};
use obscur_crypto::{
    Authenticator, CipherDecryptor, CipherEncryptor, CipherReader, CipherWriter, MacReader,
    MacWriter, SCRYPT_KEY_PARAMS, SCRYPT_PASSPHRASE_PARAMS, StreamCsprng, WorkingKeys, confirm_key,
    derive_working_keys, registry, um1, verified_output,
};
use obscur_proto::{
    AuthenticationConfig, KeyConfirmationConfig, KeyDerivationConfig, Manifest,
    ManifestCryptoConfig, ManifestCryptoPolicy, ManifestHeader, SymmetricCipherConfig,
    SymmetricManifestConfig, Um1ManifestConfig, read_header, write_header,
};
use rand_core::{CryptoRng, RngCore};
use tracing::{debug, trace};
use zeroize::Zeroizing;

use crate::errors::PackageError;
use crate::keys::KeyProvider;
use crate::options::{CryptoSuite, ManifestWriteKey, WriteOptions};

/// Upper bound on the manifest ciphertext, as a length-prefix sanity check.
const MAX_MANIFEST_CIPHERTEXT: u32 = 32 * 1024 * 1024;

/// Salt length for KDF and key confirmation records.
const SALT_LEN: usize = 16;

/// Result of opening a manifest: the decoded table of contents plus the
/// side-channel observations the reader reports.
pub(crate) struct OpenedManifest {
    /// Decoded and validated manifest.
    pub manifest: Manifest,
    /// Parsed package header.
    pub header: ManifestHeader,
    /// Index of the confirmed candidate (symmetric pool index, or pairwise
    /// foreign×local index for UM1).
    pub key_index: Option<usize>,
}

/// Build a cipher config for the suite with a fresh random IV.
pub(crate) fn fresh_cipher_config<R: RngCore + CryptoRng>(
    rng: &mut R,
    suite: &CryptoSuite,
) -> Result<SymmetricCipherConfig, PackageError> {
    let spec = registry::cipher_spec(&suite.cipher)?;
    let mut iv = vec![0u8; spec.iv_size_bytes];
    rng.fill_bytes(&mut iv);

    let config = SymmetricCipherConfig {
        cipher: suite.cipher.clone(),
        mode: suite.mode.clone(),
        padding: suite.padding.clone(),
        key_size_bits: suite.cipher_key_bits,
        iv,
    };
    registry::validate_cipher_config(&config)?;
    Ok(config)
}

/// Build the authentication config for the suite.
pub(crate) fn auth_config(suite: &CryptoSuite) -> Result<AuthenticationConfig, PackageError> {
    let config = AuthenticationConfig {
        scheme: suite.mac.clone(),
        key_size_bits: suite.mac_key_bits,
        salt: Vec::new(),
    };
    registry::validate_auth_config(&config)?;
    Ok(config)
}

/// Build a KDF config for the suite; scrypt cost follows pre-key provenance.
pub(crate) fn fresh_kdf_config<R: RngCore + CryptoRng>(
    rng: &mut R,
    suite: &CryptoSuite,
    low_entropy: bool,
) -> Result<KeyDerivationConfig, PackageError> {
    registry::kdf_spec(&suite.kdf)?;
    let mut salt = vec![0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);

    let config = match suite.kdf.as_str() {
        "Scrypt" => {
            let params = if low_entropy { SCRYPT_PASSPHRASE_PARAMS } else { SCRYPT_KEY_PARAMS };
            KeyDerivationConfig::scrypt(salt, params)?
        },
        _ => KeyDerivationConfig::pbkdf2(salt, obscur_crypto::PBKDF2_DEFAULT_PARAMS)?,
    };
    Ok(config)
}

/// Build a key confirmation config with a fresh salt.
pub(crate) fn fresh_confirmation_config<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> KeyConfirmationConfig {
    let mut salt = vec![0u8; SALT_LEN];
    rng.fill_bytes(&mut salt);
    KeyConfirmationConfig { scheme: registry::DEFAULT_CONFIRMATION_MAC.to_string(), salt }
}

fn working_key_lengths(policy: &ManifestCryptoPolicy) -> (usize, usize) {
    (
        policy.cipher.key_size_bits as usize / 8,
        policy.authentication.key_size_bits as usize / 8,
    )
}

fn obfuscate_prefix(length: u32, mac_key: &[u8]) -> [u8; 4] {
    let mut prefix = [0u8; 4];
    let Some(()) = put_u32_le(&mut prefix, length) else {
        unreachable!("prefix buffer is exactly four bytes");
    };
    for (byte, key_byte) in prefix.iter_mut().zip(mac_key) {
        *byte ^= key_byte;
    }
    prefix
}

/// Seal the manifest onto `out`: header tag, header DTO, obfuscated length
/// prefix, ciphertext.
pub(crate) fn seal_manifest<W: Write, R: RngCore + CryptoRng>(
    out: &mut W,
    rng: &mut R,
    manifest: &Manifest,
    options: &WriteOptions,
) -> Result<(), PackageError> {
    let cipher_config = fresh_cipher_config(rng, &options.suite)?;
    let authentication = auth_config(&options.suite)?;
    let key_derivation =
        fresh_kdf_config(rng, &options.suite, options.manifest_key.is_low_entropy())?;
    let key_confirmation =
        options.key_confirmation.then(|| fresh_confirmation_config(rng));

    // Establish the pre-key; UM1 additionally yields the ephemeral key the
    // header must carry.
    let (pre_key, ephemeral_key): (Zeroizing<Vec<u8>>, Option<[u8; 32]>) =
        match &options.manifest_key {
            ManifestWriteKey::Key(key) => (key.clone(), None),
            ManifestWriteKey::Passphrase(passphrase) => {
                (Zeroizing::new(passphrase.as_bytes().to_vec()), None)
            },
            ManifestWriteKey::Um1 { sender, recipient_public } => {
                let (ephemeral, pre_key) = um1::initiate(rng, sender, recipient_public);
                (pre_key, Some(ephemeral))
            },
        };

    let key_confirmation_output = match &key_confirmation {
        Some(config) => verified_output(config, &pre_key)?,
        None => Vec::new(),
    };

    let policy = ManifestCryptoPolicy {
        cipher: cipher_config,
        authentication,
        key_derivation,
        key_confirmation,
        key_confirmation_output,
        authentication_output: Vec::new(),
    };

    let keys: WorkingKeys = {
        let (cipher_len, mac_len) = working_key_lengths(&policy);
        derive_working_keys(&pre_key, &policy.key_derivation, cipher_len, mac_len)?
    };
    drop(pre_key);

    let mut plaintext = manifest.encode()?;
    if options.use_compression {
        let mut encoder = lz4_flex::frame::FrameEncoder::new(Vec::new());
        encoder.write_all(&plaintext)?;
        let compressed = encoder
            .finish()
            .map_err(|_| PackageError::CryptoInternal { context: "manifest compression" })?;
        wipe_vec(&mut plaintext);
        plaintext = compressed;
    }

    // Stack order on write: inner = buffer, then MAC (sees ciphertext),
    // then cipher.
    let mac = Authenticator::from_config(&policy.authentication, &keys.mac_key)?;
    let mac_writer = MacWriter::new(Vec::new(), mac);
    let encryptor = CipherEncryptor::from_config(&policy.cipher, &keys.cipher_key)?;
    let mut stack = CipherWriter::new(mac_writer, encryptor);
    stack.write_all(&plaintext)?;
    wipe_vec(&mut plaintext);
    let mut mac_writer = stack.finish()?;

    let ciphertext_len = mac_writer.bytes_written();
    let ciphertext_len = u32::try_from(ciphertext_len)
        .ok()
        .filter(|&len| len <= MAX_MANIFEST_CIPHERTEXT)
        .ok_or_else(|| PackageError::ConfigurationInvalid {
            reason: "manifest ciphertext exceeds the 32-bit length prefix".to_string(),
        })?;
    let prefix = obfuscate_prefix(ciphertext_len, &keys.mac_key);

    // Associated data: the prefix as on the wire, then the authenticatible
    // clone of the scheme config.
    let mut config = match ephemeral_key {
        None => ManifestCryptoConfig::Symmetric(SymmetricManifestConfig { policy }),
        Some(ephemeral_key) => ManifestCryptoConfig::Um1(Um1ManifestConfig {
            policy,
            ephemeral_key: ephemeral_key.to_vec(),
        }),
    };
    mac_writer.update_extra(&prefix);
    mac_writer.update_extra(&config.authenticatible_clone().encode()?);
    let (tag, ciphertext) = mac_writer.finalize();
    config.policy_mut().authentication_output = tag;

    let header = ManifestHeader {
        format_version: obscur_proto::CURRENT_VERSION,
        scheme: config.scheme(),
        use_compression: options.use_compression,
        scheme_config: config.encode()?,
    };

    write_header(out, &header)?;
    out.write_all(&prefix)?;
    out.write_all(&ciphertext)?;

    debug!(
        scheme = header.scheme.name(),
        ciphertext_len,
        compressed = options.use_compression,
        "manifest sealed"
    );
    Ok(())
}

/// Identify the manifest pre-key among the provider's candidates.
///
/// Returns the pre-key and the observable candidate index.
fn establish_pre_key<P: KeyProvider + ?Sized>(
    config: &ManifestCryptoConfig,
    provider: &P,
) -> Result<(Zeroizing<Vec<u8>>, Option<usize>), PackageError> {
    match config {
        ManifestCryptoConfig::Symmetric(symmetric) => {
            let candidates = provider.symmetric_keys();
            match &symmetric.policy.key_confirmation {
                Some(confirmation) => {
                    let index = confirm_key(
                        confirmation,
                        &symmetric.policy.key_confirmation_output,
                        &candidates,
                    )?
                    .ok_or(PackageError::KeyNotFound)?;
                    trace!(index, pool = candidates.len(), "manifest key confirmed");
                    Ok((candidates[index].clone(), Some(index)))
                },
                None => {
                    // Without a confirmation record there is nothing to
                    // search with; exactly one candidate is acceptable.
                    if candidates.len() != 1 {
                        return Err(PackageError::KeyNotFound);
                    }
                    Ok((candidates[0].clone(), Some(0)))
                },
            }
        },
        ManifestCryptoConfig::Um1(um1_config) => {
            let curve = registry::curve_spec("Curve25519")?;
            let ephemeral: [u8; 32] = um1_config
                .ephemeral_key
                .as_slice()
                .try_into()
                .ok()
                .filter(|_| um1_config.ephemeral_key.len() == curve.public_key_bytes)
                .ok_or_else(|| PackageError::Malformed {
                    context: "um1 ephemeral key".to_string(),
                })?;

            let foreign = provider.foreign_public_keys();
            let locals = provider.ec_keypairs();

            match &um1_config.policy.key_confirmation {
                Some(confirmation) => {
                    // Cross product of foreign publics × local keypairs,
                    // with the UM1 responder as the candidate generator.
                    let mut candidates = Vec::with_capacity(foreign.len() * locals.len());
                    for sender_public in &foreign {
                        for local in &locals {
                            candidates.push(um1::respond(local, sender_public, &ephemeral));
                        }
                    }
                    let index = confirm_key(
                        confirmation,
                        &um1_config.policy.key_confirmation_output,
                        &candidates,
                    )?
                    .ok_or(PackageError::KeyNotFound)?;
                    trace!(index, pairs = candidates.len(), "um1 pre-key confirmed");
                    Ok((candidates[index].clone(), Some(index)))
                },
                None => {
                    if foreign.len() != 1 || locals.len() != 1 {
                        return Err(PackageError::KeyNotFound);
                    }
                    Ok((um1::respond(&locals[0], &foreign[0], &ephemeral), Some(0)))
                },
            }
        },
    }
}

/// Open the manifest from `input`, leaving the stream positioned at the
/// first byte after the ciphertext (the payload offset region).
pub(crate) fn open_manifest<R: Read, P: KeyProvider + ?Sized>(
    input: &mut R,
    provider: &P,
) -> Result<OpenedManifest, PackageError> {
    let header = read_header(input)?;
    let config = ManifestCryptoConfig::decode(header.scheme, &header.scheme_config)?;
    debug!(scheme = header.scheme.name(), "package header parsed");

    let (pre_key, key_index) = establish_pre_key(&config, provider)?;
    let keys: WorkingKeys = {
        let policy = config.policy();
        let (cipher_len, mac_len) = working_key_lengths(policy);
        derive_working_keys(&pre_key, &policy.key_derivation, cipher_len, mac_len)?
    };
    drop(pre_key);

    let mut prefix = [0u8; 4];
    input
        .read_exact(&mut prefix)
        .map_err(|err| map_truncation(err, "manifest length prefix"))?;
    let obfuscated = read_u32_le(&prefix)
        .ok_or(PackageError::Truncated { context: "manifest length prefix" })?;
    let mask = read_u32_le(&keys.mac_key)
        .ok_or(PackageError::CryptoInternal { context: "mac key too short for prefix mask" })?;
    let ciphertext_len = obfuscated ^ mask;
    if ciphertext_len > MAX_MANIFEST_CIPHERTEXT {
        return Err(PackageError::Malformed { context: "manifest length".to_string() });
    }
    trace!(ciphertext_len, "manifest length prefix de-obfuscated");

    // Mirror stack: inner = input, then MAC (sees ciphertext), then cipher.
    let policy = config.policy();
    let mac = Authenticator::from_config(&policy.authentication, &keys.mac_key)?;
    let mac_reader = MacReader::new(input.take(u64::from(ciphertext_len)), mac);
    let decryptor = CipherDecryptor::from_config(&policy.cipher, &keys.cipher_key)?;
    let mut stack = CipherReader::new(mac_reader, decryptor);

    let mut plaintext = Vec::new();
    let body_result = stack.read_to_end(&mut plaintext);
    let mut mac_reader = stack.into_inner();

    if mac_reader.bytes_read() < u64::from(ciphertext_len) {
        // Nothing to authenticate against; the package itself is cut short.
        return Err(PackageError::Truncated { context: "ciphertext manifest" });
    }

    mac_reader.update_extra(&prefix);
    mac_reader.update_extra(&config.authenticatible_clone().encode()?);
    let (tag, _) = mac_reader.finalize();
    if !ct_eq(&tag, &policy.authentication_output) {
        return Err(PackageError::ManifestNotAuthenticated);
    }

    // Authentication passed; a decryption shape problem (bad padding,
    // misaligned blocks) is now reportable as malformed plaintext.
    match body_result {
        Ok(_) => {},
        Err(err) if err.kind() == std::io::ErrorKind::InvalidData => {
            return Err(PackageError::Malformed { context: "manifest plaintext".to_string() });
        },
        Err(err) => return Err(PackageError::Io(err)),
    }

    if header.use_compression {
        let mut decoder = lz4_flex::frame::FrameDecoder::new(plaintext.as_slice());
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|_| PackageError::Malformed { context: "compressed manifest".to_string() })?;
        wipe_vec(&mut plaintext);
        plaintext = decompressed;
    }

    let manifest = Manifest::decode(&plaintext)?;
    wipe_vec(&mut plaintext);

    debug!(items = manifest.payload_items.len(), key_index, "manifest opened");
    Ok(OpenedManifest { manifest, header, key_index })
}

/// Seed the scheduling CSPRNGs declared by the manifest.
pub(crate) fn scheduling_rngs(
    manifest: &Manifest,
) -> Result<(StreamCsprng, Option<StreamCsprng>), PackageError> {
    let configuration = &manifest.payload_configuration;
    let primary = StreamCsprng::from_config(&configuration.primary_prng)?;
    let secondary = configuration
        .secondary_prng
        .as_ref()
        .map(StreamCsprng::from_config)
        .transpose()?;
    Ok((primary, secondary))
}

fn map_truncation(err: std::io::Error, context: &'static str) -> PackageError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        PackageError::Truncated { context }
    } else {
        PackageError::Io(err)
    }
}
