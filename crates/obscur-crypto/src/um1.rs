//! One-pass unified-model (UM1) hybrid agreement over Curve25519.
//!
//! The initiator holds a long-term keypair and the recipient's public key;
//! it generates a single-use ephemeral keypair and derives two Diffie-Hellman
//! legs: ephemeral→recipient and static→recipient. The pre-key is their
//! concatenation, stretched by the KDF before any use. The responder
//! recomputes both legs from its private key, the initiator's public key,
//! and the ephemeral public key carried in the package header.
//!
//! Binding the static leg in means a package only opens for the recipient
//! AND confirms which sender static key produced it — which is exactly what
//! the pairwise candidate search over (foreign public, local keypair) pairs
//! exploits.

use rand_core::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

/// A Curve25519 keypair with a wiped-on-drop private half.
#[derive(Clone)]
pub struct EcKeypair {
    /// Public key bytes.
    pub public: [u8; 32],
    private: Zeroizing<[u8; 32]>,
}

impl std::fmt::Debug for EcKeypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never expose the private half, even in debug output.
        f.debug_struct("EcKeypair").field("public", &self.public).finish_non_exhaustive()
    }
}

impl EcKeypair {
    /// Generate a fresh keypair.
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        let secret = StaticSecret::random_from_rng(&mut *rng);
        let public = PublicKey::from(&secret);
        Self { public: public.to_bytes(), private: Zeroizing::new(secret.to_bytes()) }
    }

    /// Build from raw private key bytes (clamped per X25519).
    pub fn from_private(private: [u8; 32]) -> Self {
        let secret = StaticSecret::from(private);
        let public = PublicKey::from(&secret);
        Self { public: public.to_bytes(), private: Zeroizing::new(secret.to_bytes()) }
    }

    /// Private key bytes.
    pub fn private_bytes(&self) -> &[u8; 32] {
        &self.private
    }

    fn secret(&self) -> StaticSecret {
        StaticSecret::from(*self.private)
    }
}

/// Initiator side: derive the pre-key and the ephemeral public key to carry.
///
/// Returns `(ephemeral_public, pre_key)` where the pre-key is the 64-byte
/// concatenation of the ephemeral-static and static-static legs.
pub fn initiate<R: RngCore + CryptoRng>(
    rng: &mut R,
    sender: &EcKeypair,
    recipient_public: &[u8; 32],
) -> ([u8; 32], Zeroizing<Vec<u8>>) {
    let ephemeral = StaticSecret::random_from_rng(&mut *rng);
    let ephemeral_public = PublicKey::from(&ephemeral);
    let recipient = PublicKey::from(*recipient_public);

    let leg_ephemeral = ephemeral.diffie_hellman(&recipient);
    let leg_static = sender.secret().diffie_hellman(&recipient);

    let mut pre_key = Zeroizing::new(Vec::with_capacity(64));
    pre_key.extend_from_slice(leg_ephemeral.as_bytes());
    pre_key.extend_from_slice(leg_static.as_bytes());

    (ephemeral_public.to_bytes(), pre_key)
}

/// Responder side: recompute the pre-key from the carried ephemeral key.
pub fn respond(
    recipient: &EcKeypair,
    sender_public: &[u8; 32],
    ephemeral_public: &[u8; 32],
) -> Zeroizing<Vec<u8>> {
    let secret = recipient.secret();
    let leg_ephemeral = secret.diffie_hellman(&PublicKey::from(*ephemeral_public));
    let leg_static = secret.diffie_hellman(&PublicKey::from(*sender_public));

    let mut pre_key = Zeroizing::new(Vec::with_capacity(64));
    pre_key.extend_from_slice(leg_ephemeral.as_bytes());
    pre_key.extend_from_slice(leg_static.as_bytes());

    pre_key
}

#[cfg(test)]
mod tests {
    use rand_chacha::ChaCha20Rng;
    use rand_core::SeedableRng;

    use super::*;

    fn rng(seed: u8) -> ChaCha20Rng {
        ChaCha20Rng::from_seed([seed; 32])
    }

    #[test]
    fn initiator_and_responder_agree() {
        let mut rng = rng(1);
        let sender = EcKeypair::generate(&mut rng);
        let recipient = EcKeypair::generate(&mut rng);

        let (ephemeral_public, initiator_key) = initiate(&mut rng, &sender, &recipient.public);
        let responder_key = respond(&recipient, &sender.public, &ephemeral_public);

        assert_eq!(initiator_key.as_slice(), responder_key.as_slice());
        assert_eq!(initiator_key.len(), 64);
    }

    #[test]
    fn wrong_recipient_disagrees() {
        let mut rng = rng(2);
        let sender = EcKeypair::generate(&mut rng);
        let recipient = EcKeypair::generate(&mut rng);
        let wrong = EcKeypair::generate(&mut rng);

        let (ephemeral_public, initiator_key) = initiate(&mut rng, &sender, &recipient.public);
        let wrong_key = respond(&wrong, &sender.public, &ephemeral_public);

        assert_ne!(initiator_key.as_slice(), wrong_key.as_slice());
    }

    #[test]
    fn wrong_sender_public_disagrees() {
        let mut rng = rng(3);
        let sender = EcKeypair::generate(&mut rng);
        let other = EcKeypair::generate(&mut rng);
        let recipient = EcKeypair::generate(&mut rng);

        let (ephemeral_public, initiator_key) = initiate(&mut rng, &sender, &recipient.public);
        let mismatched = respond(&recipient, &other.public, &ephemeral_public);

        assert_ne!(initiator_key.as_slice(), mismatched.as_slice());
    }

    #[test]
    fn each_initiation_is_single_use() {
        let mut rng = rng(4);
        let sender = EcKeypair::generate(&mut rng);
        let recipient = EcKeypair::generate(&mut rng);

        let (eph_a, key_a) = initiate(&mut rng, &sender, &recipient.public);
        let (eph_b, key_b) = initiate(&mut rng, &sender, &recipient.public);

        assert_ne!(eph_a, eph_b, "ephemeral keys must never repeat");
        assert_ne!(key_a.as_slice(), key_b.as_slice());
    }

    #[test]
    fn from_private_reproduces_the_public_key() {
        let mut rng = rng(5);
        let keypair = EcKeypair::generate(&mut rng);
        let rebuilt = EcKeypair::from_private(*keypair.private_bytes());
        assert_eq!(rebuilt.public, keypair.public);
    }

    #[test]
    fn debug_output_hides_the_private_key() {
        let mut rng = rng(6);
        let keypair = EcKeypair::generate(&mut rng);
        let rendered = format!("{keypair:?}");
        assert!(!rendered.contains("private"));
    }
}
