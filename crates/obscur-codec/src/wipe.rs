//! Observable zeroisation of key material.
//!
//! Routed through `zeroize`, whose write path is guaranteed not to be
//! elided by dead-store optimisation. Every pre-key and working key in the
//! package pipeline goes through these helpers (or a `Zeroizing` wrapper)
//! on every exit path.

use zeroize::Zeroize;

/// Overwrite `buf` with zeroes.
pub fn wipe(buf: &mut [u8]) {
    buf.zeroize();
}

/// Overwrite a vector's contents with zeroes, then clear it.
///
/// The allocation is retained; only the bytes are destroyed.
pub fn wipe_vec(buf: &mut Vec<u8>) {
    buf.zeroize();
    buf.clear();
}
