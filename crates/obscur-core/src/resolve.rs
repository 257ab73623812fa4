//! Payload item pre-key resolution.
//!
//! Before the demultiplexer runs, every item whose keys are derived (not
//! carried) must have its pre-key identified in the caller's candidate pool
//! via the item's key confirmation recipe. Misses are collected across all
//! items and surfaced as one aggregate error, so a caller holding three of
//! five item keys learns about both gaps at once.

use std::collections::HashMap;

use obscur_crypto::confirm_key;
use obscur_proto::Manifest;
use tracing::trace;
use uuid::Uuid;
use zeroize::Zeroizing;

use crate::errors::PackageError;
use crate::keys::KeyProvider;

/// Map every derived-key item to its confirmed pre-key.
///
/// Items with carried keys are skipped. Returns the identifier→pre-key map
/// the multiplexer derives working keys from.
///
/// # Errors
///
/// `ItemKeysNotFound` naming every item whose pre-key no candidate matched,
/// after all items have been tried.
pub(crate) fn resolve_item_pre_keys<P: KeyProvider + ?Sized>(
    manifest: &Manifest,
    provider: &P,
) -> Result<HashMap<Uuid, Zeroizing<Vec<u8>>>, PackageError> {
    let mut pre_keys = HashMap::new();
    let mut missing = Vec::new();
    let mut candidates: Option<Vec<Zeroizing<Vec<u8>>>> = None;

    for item in &manifest.payload_items {
        if !item.uses_derived_keys() {
            continue;
        }

        let confirmation = item.key_confirmation.as_ref().ok_or_else(|| {
            PackageError::Malformed {
                context: format!("item {} lacks a key confirmation recipe", item.identifier),
            }
        })?;

        // Fetch the pool lazily; packages with only carried keys never ask.
        let pool = candidates.get_or_insert_with(|| provider.symmetric_keys());

        match confirm_key(confirmation, &item.key_confirmation_output, pool)? {
            Some(index) => {
                trace!(item = %item.identifier, index, "item pre-key confirmed");
                pre_keys.insert(item.identifier, pool[index].clone());
            },
            None => missing.push((item.identifier, item.path.clone())),
        }
    }

    if !missing.is_empty() {
        return Err(PackageError::ItemKeysNotFound { items: missing });
    }
    Ok(pre_keys)
}
