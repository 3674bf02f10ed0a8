//! NoodleVault - a single-user encrypted key-value vault engine.
//!
//! - Argon2id for password-based key derivation
//! - XChaCha20-Poly1305 for per-value authenticated encryption
//! - Keyed BLAKE3 for per-entry and whole-file integrity
//! - An append/compact slot table on disk, mirrored by an in-memory index

pub mod allocator;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod engine;
pub mod error;
pub mod index;
pub mod secret;
pub mod secure;

pub use engine::Vault;
pub use engine::recovery::RecoveryBlob;
pub use error::{VaultError, VaultResult};
