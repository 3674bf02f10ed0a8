//! Crypto Primitives Facade: KDF, secret-box AEAD, keyed hash, CSPRNG.
//!
//! Pure functions only — no file I/O, no knowledge of the vault's on-disk
//! layout. Every fallible path returns [`crate::error::VaultError::CryptoErr`].

pub mod hash;
pub mod kdf;
pub mod random;
pub mod secretbox;
