//! Keyed BLAKE3 hashing for entry MACs and the whole-file MAC.
//!
//! Unlike a plain content hash, every digest here is keyed with the vault's
//! master key, so an attacker who can rewrite the file cannot forge a
//! matching digest without the key.

use subtle::ConstantTimeEq;

use crate::config::{HASH_SIZE, MASTER_KEY_SIZE};
use crate::error::{VaultError, VaultResult};

/// Computes the keyed hash of `data` under `key` in one call.
#[must_use]
pub fn keyed_hash(data: &[u8], key: &[u8; MASTER_KEY_SIZE]) -> [u8; HASH_SIZE] {
    let hasher = blake3::Hasher::new_keyed(key);
    hash_with(hasher, data)
}

/// Verifies `data` hashes to `expected` under `key`, in constant time.
pub fn verify(data: &[u8], key: &[u8; MASTER_KEY_SIZE], expected: &[u8; HASH_SIZE]) -> VaultResult<()> {
    let actual = keyed_hash(data, key);
    if bool::from(actual.ct_eq(expected)) { Ok(()) } else { Err(VaultError::CryptoErr) }
}

fn hash_with(mut hasher: blake3::Hasher, data: &[u8]) -> [u8; HASH_SIZE] {
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

/// Incremental keyed hash state for streaming large inputs (`rehash_file`).
pub struct IncrementalHash {
    hasher: blake3::Hasher,
}

impl IncrementalHash {
    /// Starts a new incremental hash keyed with `key`.
    #[must_use]
    pub fn init(key: &[u8; MASTER_KEY_SIZE]) -> Self {
        Self { hasher: blake3::Hasher::new_keyed(key) }
    }

    /// Feeds another chunk of input into the running hash.
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
    }

    /// Consumes the state and returns the final digest.
    #[must_use]
    pub fn finalize(self) -> [u8; HASH_SIZE] {
        *self.hasher.finalize().as_bytes()
    }
}
