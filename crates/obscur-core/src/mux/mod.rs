//! Payload multiplexer.
//!
//! Interleaves every item's encrypted+authenticated byte stream over one
//! shared region, under the schedule drawn by [`schedule::Scheduler`]. Each
//! item owns a lane: a byte-exact cipher transform plus a keyed
//! authenticator over its ciphertext, keyed either from the keys carried in
//! the manifest or derived from the item's pre-key at the lane's first use.
//!
//! Demultiplexing buffers each item's plaintext internally and releases it
//! to the caller only after the item's authenticator output matches the
//! manifest — no unverified byte ever reaches a sink.
//!
//! Item associated data, fed after the body in canonical form: UTF-8 path
//! bytes, the kind discriminant byte, then the internal length as 8
//! little-endian bytes.

pub(crate) mod schedule;

use std::collections::HashMap;
use std::io::Read;

use obscur_codec::{ct_eq, put_u64_le};
use obscur_crypto::{
    Authenticator, StreamCsprng, StreamTransform, derive_working_keys, registry,
};
use obscur_proto::{FrameshiftConfig, Manifest, PayloadItem, PayloadLayoutScheme};
use tracing::{debug, trace};
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::errors::PackageError;
use crate::options::ItemSource;
use schedule::{Scheduler, Turn};

/// Transfer granularity for a single chunk turn.
const TRANSFER_BUF: usize = 8 * 1024;

/// One item's cipher+MAC lane.
struct ItemLane {
    transform: StreamTransform,
    mac: Authenticator,
}

impl ItemLane {
    /// Build a lane from the item's working keys.
    fn new(item: &PayloadItem, cipher_key: &[u8], mac_key: &[u8]) -> Result<Self, PackageError> {
        if !registry::is_byte_exact(&item.cipher)? {
            return Err(PackageError::ConfigurationInvalid {
                reason: format!(
                    "payload item {} uses a padded cipher; items require byte-exact transforms",
                    item.identifier
                ),
            });
        }
        Ok(Self {
            transform: StreamTransform::from_config(&item.cipher, cipher_key)?,
            mac: Authenticator::from_config(&item.authentication, mac_key)?,
        })
    }

    /// Finalise with the item's associated data and produce the MAC output.
    fn finalize(mut self, item: &PayloadItem) -> Vec<u8> {
        let mut length = [0u8; 8];
        let Some(()) = put_u64_le(&mut length, item.internal_length) else {
            unreachable!("length buffer is exactly eight bytes");
        };

        self.mac.update(item.path.as_bytes());
        self.mac.update(&[item.kind.discriminant()]);
        self.mac.update(&length);
        self.mac.finalize()
    }
}

/// Resolve an item's working keys: carried in the manifest, or derived from
/// its pre-key per the item's KDF recipe.
fn item_working_keys(
    item: &PayloadItem,
    pre_keys: &HashMap<Uuid, Zeroizing<Vec<u8>>>,
) -> Result<(Zeroizing<Vec<u8>>, Zeroizing<Vec<u8>>), PackageError> {
    if !item.uses_derived_keys() {
        return Ok((
            Zeroizing::new(item.cipher_key.clone()),
            Zeroizing::new(item.authentication_key.clone()),
        ));
    }

    let derivation = item.key_derivation.as_ref().ok_or_else(|| PackageError::Malformed {
        context: format!("item {} lacks a key derivation recipe", item.identifier),
    })?;
    let pre_key = pre_keys.get(&item.identifier).ok_or_else(|| {
        PackageError::ItemKeysNotFound {
            items: vec![(item.identifier, item.path.clone())],
        }
    })?;

    let keys = derive_working_keys(
        pre_key,
        derivation,
        item.cipher.key_size_bits as usize / 8,
        item.authentication.key_size_bits as usize / 8,
    )?;
    Ok((keys.cipher_key, keys.mac_key))
}

fn scheme_config(manifest: &Manifest) -> Result<FrameshiftConfig, PackageError> {
    let configuration = &manifest.payload_configuration;
    match configuration.scheme {
        PayloadLayoutScheme::Simple => {
            // Simple carries no ranges; the scheduler only draws its
            // terminal pad, so any ordered config works as a placeholder.
            Ok(FrameshiftConfig { min_chunk: 1, max_chunk: 1, min_shift: 0, max_shift: 0 })
        },
        PayloadLayoutScheme::Frameshift | PayloadLayoutScheme::Fabric => {
            let config = FrameshiftConfig::decode(&configuration.scheme_config)?;
            config.validate()?;
            Ok(config)
        },
    }
}

fn build_scheduler(
    manifest: &Manifest,
    primary: &mut StreamCsprng,
) -> Result<Scheduler, PackageError> {
    let order = manifest.scheduling_order();
    let lengths =
        order.iter().map(|&idx| manifest.payload_items[idx].internal_length).collect();
    Ok(Scheduler::new(
        manifest.payload_configuration.scheme,
        scheme_config(manifest)?,
        order,
        lengths,
        primary,
    ))
}

fn pad_rng<'a>(
    uses_secondary: bool,
    primary: &'a mut StreamCsprng,
    secondary: &'a mut Option<StreamCsprng>,
) -> Result<&'a mut StreamCsprng, PackageError> {
    if uses_secondary {
        secondary.as_mut().ok_or_else(|| PackageError::Malformed {
            context: "missing secondary prng".to_string(),
        })
    } else {
        Ok(primary)
    }
}

/// Multiplex all item streams into `out`, filling each item's
/// `authentication_output` in the manifest.
///
/// `sources` runs parallel to `manifest.payload_items`; each must yield
/// exactly its item's declared length.
pub(crate) fn write_payload(
    out: &mut Vec<u8>,
    manifest: &mut Manifest,
    sources: Vec<ItemSource>,
    pre_keys: &HashMap<Uuid, Zeroizing<Vec<u8>>>,
    primary: &mut StreamCsprng,
    mut secondary: Option<StreamCsprng>,
) -> Result<(), PackageError> {
    debug_assert_eq!(sources.len(), manifest.payload_items.len());

    let mut lanes: Vec<Option<ItemLane>> = Vec::with_capacity(manifest.payload_items.len());
    for item in &manifest.payload_items {
        let (cipher_key, mac_key) = item_working_keys(item, pre_keys)?;
        lanes.push(Some(ItemLane::new(item, &cipher_key, &mac_key)?));
    }

    // Sources open lazily, at the item's first chunk turn.
    let mut readers: Vec<Option<Box<dyn Read>>> = Vec::with_capacity(sources.len());
    let mut pending: Vec<Option<ItemSource>> = sources.into_iter().map(Some).collect();
    readers.resize_with(pending.len(), || None);

    let mut scheduler = build_scheduler(manifest, primary)?;
    let uses_secondary = scheduler.pad_uses_secondary();
    let mut buf = [0u8; TRANSFER_BUF];

    while let Some(turn) = scheduler.next_turn(primary, secondary.as_mut()) {
        match turn {
            Turn::Chunk { item, len } => {
                trace!(item, len, "mux chunk");
                if readers[item].is_none() {
                    let source = pending[item]
                        .take()
                        .ok_or_else(|| PackageError::Malformed {
                            context: "item source reopened".to_string(),
                        })?;
                    readers[item] = Some(match source {
                        ItemSource::Bytes(bytes) => Box::new(std::io::Cursor::new(bytes)),
                        ItemSource::Factory(open) => open()?,
                    });
                }
                let reader = readers[item].as_mut().ok_or_else(|| PackageError::Malformed {
                    context: "item source unavailable".to_string(),
                })?;
                let lane = lanes[item].as_mut().ok_or_else(|| PackageError::Malformed {
                    context: "item lane already finalized".to_string(),
                })?;

                let mut left = len;
                while left > 0 {
                    let take = (left as usize).min(TRANSFER_BUF);
                    let chunk = &mut buf[..take];
                    reader.read_exact(chunk).map_err(|err| {
                        if err.kind() == std::io::ErrorKind::UnexpectedEof {
                            PackageError::Io(std::io::Error::new(
                                std::io::ErrorKind::UnexpectedEof,
                                "payload item source ended before its declared length",
                            ))
                        } else {
                            PackageError::Io(err)
                        }
                    })?;
                    lane.transform.apply(chunk)?;
                    lane.mac.update(chunk);
                    out.extend_from_slice(chunk);
                    left -= take as u64;
                }
            },
            Turn::Pad { len } => {
                trace!(len, "mux pad");
                let rng = pad_rng(uses_secondary, primary, &mut secondary)?;
                let mut left = len;
                while left > 0 {
                    let take = (left as usize).min(TRANSFER_BUF);
                    rng.fill(&mut buf[..take]);
                    out.extend_from_slice(&buf[..take]);
                    left -= take as u64;
                }
            },
        }
    }

    for (idx, item) in manifest.payload_items.iter_mut().enumerate() {
        let lane = lanes[idx].take().ok_or_else(|| PackageError::Malformed {
            context: "item lane already finalized".to_string(),
        })?;
        let tag = lane.finalize(item);
        item.authentication_output = tag;
    }

    debug!(
        items = manifest.payload_items.len(),
        payload_len = out.len(),
        "payload multiplexed"
    );
    Ok(())
}

/// Demultiplex the payload region from `input`, delivering each item's
/// verified plaintext through `deliver`.
///
/// `deliver` is invoked once per item, in manifest order, strictly after
/// the item's authenticator output matched the manifest.
pub(crate) fn read_payload<R: Read>(
    input: &mut R,
    manifest: &Manifest,
    pre_keys: &HashMap<Uuid, Zeroizing<Vec<u8>>>,
    primary: &mut StreamCsprng,
    mut secondary: Option<StreamCsprng>,
    mut deliver: impl FnMut(&PayloadItem, &[u8]) -> std::io::Result<()>,
) -> Result<(), PackageError> {
    let mut lanes: Vec<Option<ItemLane>> = Vec::with_capacity(manifest.payload_items.len());
    let mut buffers: Vec<Vec<u8>> = Vec::with_capacity(manifest.payload_items.len());
    for item in &manifest.payload_items {
        let (cipher_key, mac_key) = item_working_keys(item, pre_keys)?;
        lanes.push(Some(ItemLane::new(item, &cipher_key, &mac_key)?));
        buffers.push(Vec::new());
    }

    let mut scheduler = build_scheduler(manifest, primary)?;
    let uses_secondary = scheduler.pad_uses_secondary();
    let mut buf = [0u8; TRANSFER_BUF];

    while let Some(turn) = scheduler.next_turn(primary, secondary.as_mut()) {
        match turn {
            Turn::Chunk { item, len } => {
                let lane = lanes[item].as_mut().ok_or_else(|| PackageError::Malformed {
                    context: "item lane already finalized".to_string(),
                })?;
                let mut left = len;
                while left > 0 {
                    let take = (left as usize).min(TRANSFER_BUF);
                    let chunk = &mut buf[..take];
                    input.read_exact(chunk).map_err(|err| {
                        if err.kind() == std::io::ErrorKind::UnexpectedEof {
                            PackageError::Truncated { context: "payload region" }
                        } else {
                            PackageError::Io(err)
                        }
                    })?;
                    // Encrypt-then-MAC mirror: authenticate the ciphertext
                    // exactly as read, then decrypt.
                    lane.mac.update(chunk);
                    lane.transform.apply(chunk)?;
                    buffers[item].extend_from_slice(chunk);
                    left -= take as u64;
                }
            },
            Turn::Pad { len } => {
                let rng = pad_rng(uses_secondary, primary, &mut secondary)?;
                let mut left = len;
                while left > 0 {
                    let take = (left as usize).min(TRANSFER_BUF);
                    // Advance the generator in lockstep with the writer and
                    // discard the padding bytes from the stream.
                    rng.fill(&mut buf[..take]);
                    input.read_exact(&mut buf[..take]).map_err(|err| {
                        if err.kind() == std::io::ErrorKind::UnexpectedEof {
                            PackageError::Truncated { context: "payload padding" }
                        } else {
                            PackageError::Io(err)
                        }
                    })?;
                    left -= take as u64;
                }
            },
        }
    }

    // Verify every item before anything is released.
    for (idx, item) in manifest.payload_items.iter().enumerate() {
        let lane = lanes[idx].take().ok_or_else(|| PackageError::Malformed {
            context: "item lane already finalized".to_string(),
        })?;
        let tag = lane.finalize(item);
        if !ct_eq(&tag, &item.authentication_output) {
            return Err(PackageError::ItemNotAuthenticated {
                identifier: item.identifier,
                path: item.path.clone(),
            });
        }
        trace!(item = %item.identifier, "item authenticated");
    }

    for (idx, item) in manifest.payload_items.iter().enumerate() {
        deliver(item, &buffers[idx])?;
    }

    debug!(items = manifest.payload_items.len(), "payload demultiplexed");
    Ok(())
}
