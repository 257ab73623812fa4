//! Key confirmation.
//!
//! A verified output is the configured keyed function, keyed with a
//! candidate pre-key, run over the configuration's salt. Whoever holds the
//! matching key reproduces the output; nobody learns anything about
//! non-matching candidates beyond the mismatch itself.
//!
//! The candidate search may fan out across worker threads — the only place
//! in the package pipeline allowed to. Workers share a single atomic stop
//! flag; the winner publishes its index before raising the flag, and all
//! workers are joined before the search returns.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use obscur_codec::ct_eq;
use obscur_proto::KeyConfirmationConfig;

use crate::errors::CryptoError;
use crate::mac::Authenticator;
use crate::registry;

/// Upper bound on confirmation worker threads.
const MAX_WORKERS: usize = 8;

/// Run the confirmation function over one candidate.
pub fn verified_output(
    config: &KeyConfirmationConfig,
    candidate: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let mut mac = Authenticator::from_scheme(&config.scheme, candidate)?;
    mac.update(&config.salt);
    Ok(mac.finalize())
}

/// Search `candidates` for the key whose verified output equals `expected`.
///
/// Returns the index of the first match found, or `None`. Every comparison
/// is constant time; a candidate the primitive rejects (e.g. an oversized
/// key) simply cannot match.
///
/// # Errors
///
/// `UnknownScheme` if the configured function is not registered. Candidate
/// order of discovery is unspecified when several keys would match (which
/// cannot happen for distinct keys and a collision-resistant function).
pub fn confirm_key<K: AsRef<[u8]> + Sync>(
    config: &KeyConfirmationConfig,
    expected: &[u8],
    candidates: &[K],
) -> Result<Option<usize>, CryptoError> {
    registry::mac_spec(&config.scheme)?;

    if candidates.is_empty() {
        return Ok(None);
    }

    let workers = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
        .min(MAX_WORKERS)
        .min(candidates.len());

    if workers <= 1 {
        for (index, candidate) in candidates.iter().enumerate() {
            if matches(config, expected, candidate.as_ref()) {
                return Ok(Some(index));
            }
        }
        return Ok(None);
    }

    let found = AtomicUsize::new(usize::MAX);
    let stop = AtomicBool::new(false);
    let chunk_len = candidates.len().div_ceil(workers);

    std::thread::scope(|scope| {
        for (chunk_index, chunk) in candidates.chunks(chunk_len).enumerate() {
            let base = chunk_index * chunk_len;
            let found = &found;
            let stop = &stop;
            scope.spawn(move || {
                for (offset, candidate) in chunk.iter().enumerate() {
                    if stop.load(Ordering::Acquire) {
                        return;
                    }
                    if matches(config, expected, candidate.as_ref()) {
                        // Publish the result before raising the stop flag so
                        // observers of the flag always see the index.
                        found.store(base + offset, Ordering::Release);
                        stop.store(true, Ordering::Release);
                        return;
                    }
                }
            });
        }
    });

    match found.load(Ordering::Acquire) {
        usize::MAX => Ok(None),
        index => Ok(Some(index)),
    }
}

fn matches(config: &KeyConfirmationConfig, expected: &[u8], candidate: &[u8]) -> bool {
    match verified_output(config, candidate) {
        Ok(output) => ct_eq(&output, expected),
        Err(_) => false,
    }
}
