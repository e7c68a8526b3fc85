//! Deterministic test keys
//!
//! Keys are derived from seed strings so every run of a test signs with the
//! same material.

use ed25519_dalek::{SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

fn seed_bytes(hasher: Sha256) -> [u8; 32] {
    let mut seed = [0u8; 32];
    seed.copy_from_slice(&hasher.finalize());
    seed
}

/// Key test fixture for consistent test key generation
#[derive(Debug, Clone)]
pub struct KeyTestFixture {
    signing_key: SigningKey,
    key_id: String,
}

impl KeyTestFixture {
    /// Create a key fixture from raw seed bytes
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let key_id = format!("key_{:x}", Sha256::digest(signing_key.verifying_key().as_bytes()));
        Self {
            signing_key,
            key_id,
        }
    }

    /// Create an authority key fixture from a seed string
    pub fn from_seed_string(seed: &str) -> Self {
        Self::from_seed(&seed_bytes(Sha256::new().chain_update(seed.as_bytes())))
    }

    /// Create a key usable by a mesh leaf
    ///
    /// Leaf certificates carry the Montgomery form of the key, which only
    /// maps back to the same Edwards key when its sign bit is clear.
    pub fn leaf_from_seed_string(seed: &str) -> Self {
        (0u32..)
            .map(|counter| {
                let hasher = Sha256::new()
                    .chain_update(seed.as_bytes())
                    .chain_update(counter.to_be_bytes());
                Self::from_seed(&seed_bytes(hasher))
            })
            .find(|k| k.verifying_key().as_bytes()[31] & 0x80 == 0)
            .unwrap_or_else(|| Self::from_seed(&[0; 32]))
    }

    /// Get the signing key
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Get the verifying key
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Ed25519 public key bytes
    pub fn ed25519_public(&self) -> Vec<u8> {
        self.verifying_key().to_bytes().to_vec()
    }

    /// X25519 public key bytes
    pub fn x25519_public(&self) -> Vec<u8> {
        self.verifying_key().to_montgomery().to_bytes().to_vec()
    }

    /// Get the key ID
    pub fn key_id(&self) -> &str {
        &self.key_id
    }
}
