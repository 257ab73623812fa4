//! Key provider seam.
//!
//! The reader never receives "the key" — it receives a provider it can ask
//! for candidate material, and identifies the right candidates itself via
//! key confirmation. Providers return owned snapshots in zeroising
//! containers; the reader wipes its copies on every exit path.

use obscur_crypto::EcKeypair;
use zeroize::Zeroizing;

/// Source of candidate key material for package reading.
///
/// Each method returns a possibly-empty finite snapshot. Implementations
/// backed by key stores should return whatever candidates are plausible for
/// the package at hand; confirmation search is linear in the pool size.
pub trait KeyProvider {
    /// Candidate symmetric keys (including passphrase bytes).
    fn symmetric_keys(&self) -> Vec<Zeroizing<Vec<u8>>>;

    /// Candidate local EC keypairs for UM1 response.
    fn ec_keypairs(&self) -> Vec<EcKeypair>;

    /// Candidate foreign (sender) EC public keys for UM1 response.
    fn foreign_public_keys(&self) -> Vec<[u8; 32]>;
}

/// In-memory key provider.
#[derive(Default, Clone)]
pub struct SimpleKeyProvider {
    symmetric: Vec<Zeroizing<Vec<u8>>>,
    keypairs: Vec<EcKeypair>,
    foreign: Vec<[u8; 32]>,
}

impl std::fmt::Debug for SimpleKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimpleKeyProvider")
            .field("symmetric_keys", &self.symmetric.len())
            .field("ec_keypairs", &self.keypairs.len())
            .field("foreign_public_keys", &self.foreign.len())
            .finish()
    }
}

impl SimpleKeyProvider {
    /// Empty provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a raw symmetric key candidate.
    pub fn add_symmetric_key(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.symmetric.push(Zeroizing::new(key.into()));
        self
    }

    /// Add a passphrase candidate (its UTF-8 bytes are the pre-key).
    pub fn add_passphrase(&mut self, passphrase: &str) -> &mut Self {
        self.symmetric.push(Zeroizing::new(passphrase.as_bytes().to_vec()));
        self
    }

    /// Add a local EC keypair candidate.
    pub fn add_ec_keypair(&mut self, keypair: EcKeypair) -> &mut Self {
        self.keypairs.push(keypair);
        self
    }

    /// Add a foreign EC public key candidate.
    pub fn add_foreign_public_key(&mut self, public: [u8; 32]) -> &mut Self {
        self.foreign.push(public);
        self
    }
}

impl KeyProvider for SimpleKeyProvider {
    fn symmetric_keys(&self) -> Vec<Zeroizing<Vec<u8>>> {
        self.symmetric.clone()
    }

    fn ec_keypairs(&self) -> Vec<EcKeypair> {
        self.keypairs.clone()
    }

    fn foreign_public_keys(&self) -> Vec<[u8; 32]> {
        self.foreign.clone()
    }
}
