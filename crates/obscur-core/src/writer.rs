//! Package writer.
//!
//! Orchestrates a full write: registered items are drained through the
//! multiplexer into an in-memory staging region first (the manifest must
//! record lengths and item MACs the multiplexer produces), then the sealed
//! manifest, the payload-offset filler, the staged payload and the trailer
//! tag go out in wire order.
//!
//! Writers are single-shot. A write attempt consumes the registered items;
//! once a package has been produced, further calls fail before touching the
//! output stream, preserving the format's nonce-reuse invariants.

use std::collections::HashMap;
use std::io::Write;

use obscur_crypto::{registry, verified_output};
use obscur_proto::{
    Manifest, PayloadConfiguration, PayloadItem, PayloadLayoutScheme, PrngConfig,
    SymmetricCipherConfig, write_trailer,
};
use rand_core::{CryptoRng, RngCore};
use tracing::debug;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::errors::PackageError;
use crate::manifest_io::{
    auth_config, fresh_cipher_config, fresh_confirmation_config, fresh_kdf_config, seal_manifest,
    scheduling_rngs,
};
use crate::mux;
use crate::options::{CryptoSuite, ItemKeyPolicy, ItemSpec, WriteOptions};

/// Outcome of a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Total package length in bytes.
    pub package_length: u64,
    /// Identifiers assigned to the written items, in registration order.
    pub item_identifiers: Vec<Uuid>,
}

/// Single-shot package writer.
pub struct PackageWriter {
    options: WriteOptions,
    items: Vec<ItemSpec>,
    finished: bool,
}

impl std::fmt::Debug for PackageWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PackageWriter")
            .field("items", &self.items.len())
            .field("finished", &self.finished)
            .finish_non_exhaustive()
    }
}

struct CountingWriter<'a, W: Write> {
    inner: &'a mut W,
    count: u64,
}

impl<W: Write> Write for CountingWriter<'_, W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.count += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

fn validate_suite(suite: &CryptoSuite, items_only_byte_exact: bool) -> Result<(), PackageError> {
    let spec = registry::cipher_spec(&suite.cipher)?;
    let probe = SymmetricCipherConfig {
        cipher: suite.cipher.clone(),
        mode: suite.mode.clone(),
        padding: suite.padding.clone(),
        key_size_bits: suite.cipher_key_bits,
        iv: vec![0u8; spec.iv_size_bytes],
    };
    let byte_exact = registry::is_byte_exact(&probe)?;
    if items_only_byte_exact && !byte_exact {
        return Err(PackageError::ConfigurationInvalid {
            reason: format!(
                "{} in padded mode cannot multiplex; payload items need byte-exact transforms",
                suite.cipher
            ),
        });
    }
    auth_config(suite)?;
    registry::kdf_spec(&suite.kdf)?;
    Ok(())
}

impl PackageWriter {
    /// Create a writer; scheme names and layout ranges are validated here,
    /// before any item or stream is touched.
    pub fn new(options: WriteOptions) -> Result<Self, PackageError> {
        validate_suite(&options.suite, false)?;

        let prng = registry::cipher_spec(&options.layout.prng)?;
        if prng.kind != registry::CipherKind::Stream {
            return Err(PackageError::ConfigurationInvalid {
                reason: format!("{} cannot seed a scheduling csprng", options.layout.prng),
            });
        }
        if options.layout.scheme != PayloadLayoutScheme::Simple {
            options.layout.frameshift.validate()?;
        }

        Ok(Self { options, items: Vec::new(), finished: false })
    }

    /// Register a payload item.
    pub fn add_item(&mut self, spec: ItemSpec) -> Result<(), PackageError> {
        if self.finished {
            return Err(PackageError::WriterFinished);
        }
        validate_suite(&spec.suite, true)?;
        self.items.push(spec);
        Ok(())
    }

    /// Number of items registered so far.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Write the package using the operating system RNG.
    pub fn write<W: Write>(&mut self, out: &mut W) -> Result<WriteReceipt, PackageError> {
        self.write_with_rng(out, &mut rand::rngs::OsRng)
    }

    /// Write the package drawing all randomness from `rng`.
    ///
    /// Seeded RNGs make the entire package deterministic, which the
    /// round-trip test suites rely on.
    pub fn write_with_rng<W: Write, R: RngCore + CryptoRng>(
        &mut self,
        out: &mut W,
        rng: &mut R,
    ) -> Result<WriteReceipt, PackageError> {
        if self.finished {
            return Err(PackageError::WriterFinished);
        }
        // The attempt consumes the writer either way; sources are one-shot.
        self.finished = true;

        let configuration = self.payload_configuration(rng)?;
        let specs = std::mem::take(&mut self.items);

        let mut entries = Vec::with_capacity(specs.len());
        let mut sources = Vec::with_capacity(specs.len());
        let mut pre_keys: HashMap<Uuid, Zeroizing<Vec<u8>>> = HashMap::new();
        let mut identifiers = Vec::with_capacity(specs.len());

        for spec in specs {
            let (entry, source) = self.build_entry(rng, spec, &mut pre_keys)?;
            identifiers.push(entry.identifier);
            entries.push(entry);
            sources.push(source);
        }

        let mut manifest =
            Manifest { payload_configuration: configuration, payload_items: entries };
        manifest.validate()?;

        let (mut primary, secondary) = scheduling_rngs(&manifest)?;

        // The filler precedes the payload on the wire, so its draw precedes
        // every scheduling draw.
        let mut filler = vec![0u8; manifest.payload_configuration.payload_offset as usize];
        primary.fill(&mut filler);

        let mut staging = Vec::new();
        mux::write_payload(
            &mut staging,
            &mut manifest,
            sources,
            &pre_keys,
            &mut primary,
            secondary,
        )?;

        let mut counted = CountingWriter { inner: out, count: 0 };
        seal_manifest(&mut counted, rng, &manifest, &self.options)?;
        counted.write_all(&filler)?;
        counted.write_all(&staging)?;
        write_trailer(&mut counted)?;
        counted.flush()?;

        debug!(
            package_length = counted.count,
            items = identifiers.len(),
            scheme = ?manifest.payload_configuration.scheme,
            "package written"
        );
        Ok(WriteReceipt { package_length: counted.count, item_identifiers: identifiers })
    }

    fn payload_configuration<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> Result<PayloadConfiguration, PackageError> {
        let layout = &self.options.layout;
        let scheme_config = match layout.scheme {
            PayloadLayoutScheme::Simple => Vec::new(),
            PayloadLayoutScheme::Frameshift | PayloadLayoutScheme::Fabric => {
                layout.frameshift.validate()?;
                layout.frameshift.encode()?
            },
        };

        let secondary_prng = layout
            .scheme
            .needs_secondary_prng()
            .then(|| self.fresh_prng_config(rng))
            .transpose()?;

        Ok(PayloadConfiguration {
            scheme: layout.scheme,
            primary_prng: self.fresh_prng_config(rng)?,
            secondary_prng,
            payload_offset: self.options.payload_offset,
            scheme_config,
        })
    }

    fn fresh_prng_config<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
    ) -> Result<PrngConfig, PackageError> {
        let spec = registry::cipher_spec(&self.options.layout.prng)?;
        let mut key = vec![0u8; spec.key_sizes_bits[0] as usize / 8];
        let mut iv = vec![0u8; spec.iv_size_bytes];
        rng.fill_bytes(&mut key);
        rng.fill_bytes(&mut iv);
        Ok(PrngConfig { name: self.options.layout.prng.clone(), key, iv })
    }

    fn build_entry<R: RngCore + CryptoRng>(
        &self,
        rng: &mut R,
        spec: ItemSpec,
        pre_keys: &mut HashMap<Uuid, Zeroizing<Vec<u8>>>,
    ) -> Result<(PayloadItem, crate::options::ItemSource), PackageError> {
        let mut id_bytes = [0u8; 16];
        rng.fill_bytes(&mut id_bytes);
        let identifier = uuid::Builder::from_random_bytes(id_bytes).into_uuid();

        let cipher = fresh_cipher_config(rng, &spec.suite)?;
        let authentication = auth_config(&spec.suite)?;

        let mut entry = PayloadItem {
            identifier,
            kind: spec.kind,
            path: spec.path,
            external_length: spec.length,
            internal_length: spec.length,
            cipher,
            authentication,
            cipher_key: Vec::new(),
            authentication_key: Vec::new(),
            key_derivation: None,
            key_confirmation: None,
            key_confirmation_output: Vec::new(),
            authentication_output: Vec::new(),
        };

        match spec.key_policy {
            ItemKeyPolicy::Carried => {
                let mut cipher_key = vec![0u8; spec.suite.cipher_key_bits as usize / 8];
                let mut mac_key = vec![0u8; spec.suite.mac_key_bits as usize / 8];
                rng.fill_bytes(&mut cipher_key);
                rng.fill_bytes(&mut mac_key);
                entry.cipher_key = cipher_key;
                entry.authentication_key = mac_key;
            },
            ItemKeyPolicy::Derived { pre_key } => {
                // Item pre-keys are high-entropy by contract; the cheap KDF
                // profile applies.
                let key_derivation = fresh_kdf_config(rng, &spec.suite, false)?;
                let key_confirmation = fresh_confirmation_config(rng);
                entry.key_confirmation_output = verified_output(&key_confirmation, &pre_key)?;
                entry.key_derivation = Some(key_derivation);
                entry.key_confirmation = Some(key_confirmation);
                pre_keys.insert(identifier, pre_key);
            },
        }

        Ok((entry, spec.source))
    }
}
