//! Package reader.
//!
//! Orchestrates a full read: open and authenticate the manifest, replay the
//! payload-offset filler, resolve item pre-keys against the caller's
//! candidate pool, demultiplex and verify every item, then check the
//! trailer tag. Payload bytes reach the caller only after both the manifest
//! and the owning item have authenticated.
//!
//! A missing or corrupt trailer after an otherwise clean read is a soft
//! outcome (`trailer_valid == false`), not an error — the payload has
//! already unpacked and verified by the time the trailer is reachable.

use std::io::Read;

use obscur_proto::{PayloadItem, PayloadItemKind, read_trailer};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::errors::PackageError;
use crate::keys::KeyProvider;
use crate::manifest_io::{open_manifest, scheduling_rngs};
use crate::mux;
use crate::resolve::resolve_item_pre_keys;

/// One verified item, content included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedItem {
    /// Item identifier.
    pub identifier: Uuid,
    /// Item kind.
    pub kind: PayloadItemKind,
    /// Item path.
    pub path: String,
    /// Verified plaintext content.
    pub content: Vec<u8>,
}

/// One verified item, metadata only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSummary {
    /// Item identifier.
    pub identifier: Uuid,
    /// Item kind.
    pub kind: PayloadItemKind,
    /// Item path.
    pub path: String,
    /// Plaintext length in bytes.
    pub length: u64,
}

/// Outcome of a sink-driven read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadReport {
    /// Verified items in manifest order.
    pub items: Vec<ItemSummary>,
    /// Which candidate key opened the manifest (pool index; pairwise index
    /// for UM1). Observable for testing and key-rotation bookkeeping.
    pub manifest_key_index: Option<usize>,
    /// False when the trailer tag was missing or corrupt; the payload above
    /// it still verified.
    pub trailer_valid: bool,
}

/// Outcome of an in-memory read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageContents {
    /// Verified items with their content, in manifest order.
    pub items: Vec<ExtractedItem>,
    /// Which candidate key opened the manifest.
    pub manifest_key_index: Option<usize>,
    /// False when the trailer tag was missing or corrupt.
    pub trailer_valid: bool,
}

/// Read a package, delivering each item's verified content to `deliver`.
///
/// `deliver` runs once per item in manifest order, strictly after the
/// manifest and that item have both authenticated. Errors it returns abort
/// the read.
pub fn read_package_with<R, P, F>(
    mut input: R,
    provider: &P,
    deliver: F,
) -> Result<ReadReport, PackageError>
where
    R: Read,
    P: KeyProvider + ?Sized,
    F: FnMut(&PayloadItem, &[u8]) -> std::io::Result<()>,
{
    let opened = open_manifest(&mut input, provider)?;
    debug!(
        scheme = opened.header.scheme.name(),
        compressed = opened.header.use_compression,
        "manifest opened and authenticated"
    );
    let manifest = opened.manifest;

    let (mut primary, secondary) = scheduling_rngs(&manifest)?;
    skip_payload_offset(&mut input, &mut primary, manifest.payload_configuration.payload_offset)?;

    let pre_keys = resolve_item_pre_keys(&manifest, provider)?;
    mux::read_payload(&mut input, &manifest, &pre_keys, &mut primary, secondary, deliver)?;

    let trailer_valid = read_trailer(&mut input)?;
    if !trailer_valid {
        warn!("package trailer missing or corrupt; payload verified regardless");
    }

    let items = manifest
        .payload_items
        .iter()
        .map(|item| ItemSummary {
            identifier: item.identifier,
            kind: item.kind,
            path: item.path.clone(),
            length: item.internal_length,
        })
        .collect();

    debug!(trailer_valid, "package read complete");
    Ok(ReadReport { items, manifest_key_index: opened.key_index, trailer_valid })
}

/// Read a package entirely into memory.
pub fn read_package<R, P>(input: R, provider: &P) -> Result<PackageContents, PackageError>
where
    R: Read,
    P: KeyProvider + ?Sized,
{
    let mut items = Vec::new();
    let report = read_package_with(input, provider, |item, content| {
        items.push(ExtractedItem {
            identifier: item.identifier,
            kind: item.kind,
            path: item.path.clone(),
            content: content.to_vec(),
        });
        Ok(())
    })?;

    Ok(PackageContents {
        items,
        manifest_key_index: report.manifest_key_index,
        trailer_valid: report.trailer_valid,
    })
}

/// Skip the CSPRNG filler between the manifest and the payload region,
/// advancing the primary generator in lockstep with the writer's draw.
fn skip_payload_offset<R: Read>(
    input: &mut R,
    primary: &mut obscur_crypto::StreamCsprng,
    offset: u32,
) -> Result<(), PackageError> {
    let mut remaining = offset as usize;
    let mut scratch = [0u8; 4096];
    while remaining > 0 {
        let take = remaining.min(scratch.len());
        primary.fill(&mut scratch[..take]);
        input.read_exact(&mut scratch[..take]).map_err(|err| {
            if err.kind() == std::io::ErrorKind::UnexpectedEof {
                PackageError::Truncated { context: "payload offset filler" }
            } else {
                PackageError::Io(err)
            }
        })?;
        remaining -= take;
    }
    Ok(())
}
