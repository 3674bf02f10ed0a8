//! Secret-box style authenticated encryption (XChaCha20-Poly1305).
//!
//! On-disk framing (§3.2) stores the nonce in its own 24-byte field at the
//! tail of the entry, separate from the ciphertext, rather than prepended to
//! it — so unlike a typical wrapper, `encrypt`/`decrypt` here take the nonce
//! as an explicit argument instead of generating and splicing one in.

use chacha20poly1305::aead::Aead;
use chacha20poly1305::{KeyInit, XChaCha20Poly1305, XNonce};

use crate::config::{MASTER_KEY_SIZE, NONCE_SIZE};
use crate::error::{VaultError, VaultResult};

/// Encrypts `plaintext` under `key` and `nonce`, returning `ciphertext‖MAC`.
pub fn encrypt(plaintext: &[u8], nonce: &[u8; NONCE_SIZE], key: &[u8; MASTER_KEY_SIZE]) -> VaultResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| VaultError::CryptoErr)?;
    cipher.encrypt(XNonce::from_slice(nonce), plaintext).map_err(|_| VaultError::CryptoErr)
}

/// Decrypts `ciphertext‖MAC` under `key` and `nonce`, verifying the tag.
pub fn decrypt(ciphertext: &[u8], nonce: &[u8; NONCE_SIZE], key: &[u8; MASTER_KEY_SIZE]) -> VaultResult<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new_from_slice(key).map_err(|_| VaultError::CryptoErr)?;
    cipher.decrypt(XNonce::from_slice(nonce), ciphertext).map_err(|_| VaultError::CryptoErr)
}

/// Generates a fresh 32-byte secret-box key.
pub fn keygen() -> VaultResult<[u8; MASTER_KEY_SIZE]> {
    crate::crypto::random::fill()
}
