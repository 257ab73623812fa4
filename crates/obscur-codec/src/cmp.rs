//! Constant-time byte comparison.

use subtle::ConstantTimeEq;

/// Compare two byte slices in constant time with respect to their contents.
///
/// The comparison cost depends only on the slice lengths, never on where the
/// first differing byte sits. Slices of different lengths compare unequal
/// (the length itself is not secret).
///
/// Use this for every comparison involving key material or authenticator
/// outputs; a short-circuiting `==` would leak the match prefix length
/// through timing.
pub fn ct_eq(a: &[u8], b: &[u8]) -> bool {
    a.ct_eq(b).into()
}
