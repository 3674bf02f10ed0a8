//! The recovery protocol (§4.5.14): splits the master key so that two
//! independently-salted answers can jointly reconstruct it, without the
//! remote backup service ever learning either answer or the master key.

use tracing::instrument;

use super::{Vault, lock_exclusive, vault_path};
use crate::codec::header::Header;
use crate::config::{HEADER_SIZE, MASTER_KEY_SIZE, NONCE_SIZE, SALT_SIZE};
use crate::crypto::{kdf, random, secretbox};
use crate::error::{VaultError, VaultResult};
use crate::index::KeyIndex;
use crate::secret::Secret;

/// The doubly-encrypted master key handed to the remote backup service, per
/// §4.5.14. Opaque to the service: recoverable only by someone who supplies
/// both `r1` and `r2` back to [`update_key_from_recovery`].
#[derive(Clone)]
pub struct RecoveryBlob {
    pub data_salt_11: [u8; SALT_SIZE],
    pub data_salt_12: [u8; SALT_SIZE],
    pub data_salt_21: [u8; SALT_SIZE],
    pub data_salt_22: [u8; SALT_SIZE],
    pub second_pass_salt: [u8; SALT_SIZE],
    nonce1: [u8; NONCE_SIZE],
    nonce2: [u8; NONCE_SIZE],
    outer: Vec<u8>,
}

impl Vault {
    /// Splits the currently-held master key into a [`RecoveryBlob`] that
    /// `r1`/`r2` alone can reconstruct, plus a `server_pass` the caller
    /// uploads alongside it so the service can authenticate future recovery
    /// attempts without ever seeing `r1`/`r2` or the master key.
    #[instrument(skip(self, r1, r2))]
    pub fn create_data_for_server(&self, r1: &[u8], r2: &[u8]) -> VaultResult<(RecoveryBlob, Vec<u8>)> {
        let _guard = self.arena.enable_rw()?;

        let data_salt_11: [u8; SALT_SIZE] = random::fill()?;
        let data_salt_12: [u8; SALT_SIZE] = random::fill()?;
        let data_salt_21: [u8; SALT_SIZE] = random::fill()?;
        let data_salt_22: [u8; SALT_SIZE] = random::fill()?;
        let second_pass_salt: [u8; SALT_SIZE] = random::fill()?;

        let server_pass = create_password_for_server(self.derived_key.expose_secret(), &second_pass_salt)?;

        let data1_master = kdf::derive(r1, &data_salt_11)?;
        let data2_master = kdf::derive(r2, &data_salt_21)?;

        let nonce1: [u8; NONCE_SIZE] = random::fill()?;
        let nonce2: [u8; NONCE_SIZE] = random::fill()?;
        let intermediate = secretbox::encrypt(self.master.expose_secret(), &nonce1, &data1_master)?;
        let outer = secretbox::encrypt(&intermediate, &nonce2, &data2_master)?;

        let blob = RecoveryBlob { data_salt_11, data_salt_12, data_salt_21, data_salt_22, second_pass_salt, nonce1, nonce2, outer };
        Ok((blob, server_pass))
    }

    /// Reconstructs the master key from `recovery` and fresh answers
    /// `r1`/`r2`, re-wraps it under `new_password`, and opens the
    /// result — all without the caller ever needing the old password.
    ///
    /// Every error path below returns before a `Vault` is constructed, so
    /// the file (if already opened) is dropped and its lock released for
    /// free; no ported "close on every error path" bookkeeping is needed.
    #[instrument(skip(r1, r2, recovery, new_password), fields(user_len = username.len()))]
    pub fn update_key_from_recovery(
        directory: &str,
        username: &str,
        recovery: &RecoveryBlob,
        r1: &[u8],
        r2: &[u8],
        new_password: &[u8],
    ) -> VaultResult<(Self, [u8; 108], Vec<u8>)> {
        let data1_master = kdf::derive(r1, &recovery.data_salt_11)?;
        let data2_master = kdf::derive(r2, &recovery.data_salt_21)?;

        let intermediate = secretbox::decrypt(&recovery.outer, &recovery.nonce2, &data2_master).map_err(|_| VaultError::WrongPass)?;
        let master_vec = secretbox::decrypt(&intermediate, &recovery.nonce1, &data1_master).map_err(|_| VaultError::WrongPass)?;
        let master: [u8; MASTER_KEY_SIZE] = master_vec.try_into().map_err(|_| VaultError::WrongPass)?;

        let path = vault_path(directory, username, new_password)?;
        let file = std::fs::OpenOptions::new().read(true).write(true).open(&path)?;
        lock_exclusive(&file)?;

        let mut header_buf = [0u8; HEADER_SIZE];
        std::os::unix::fs::FileExt::read_exact_at(&file, &mut header_buf, 0).map_err(|_| VaultError::IoErr)?;
        let mut header = Header::from_bytes(&header_buf)?;

        let file_len = crate::codec::entry::file_len(&file)?;
        let mut trailing = [0u8; crate::config::HASH_SIZE];
        std::os::unix::fs::FileExt::read_exact_at(&file, &mut trailing, file_len - crate::config::HASH_SIZE as u64)
            .map_err(|_| VaultError::IoErr)?;
        let recomputed = crate::codec::entry::rehash_file(&file, &master, crate::config::HASH_SIZE as u64)?;
        if !bool::from(subtle::ConstantTimeEq::ct_eq(&recomputed[..], &trailing[..])) {
            return Err(VaultError::File);
        }

        let new_salt: [u8; SALT_SIZE] = random::fill()?;
        let new_nonce: [u8; NONCE_SIZE] = random::fill()?;
        let new_wrap = kdf::derive(new_password, &new_salt)?;
        let new_encrypted_master = secretbox::encrypt(&master, &new_nonce, &new_wrap)?;

        header.salt = new_salt;
        header.encrypted_master = new_encrypted_master.try_into().map_err(|_| VaultError::CryptoErr)?;
        header.master_nonce = new_nonce;

        let index = KeyIndex::rebuild_from_file(&file, &header)?;
        let slot_count = header.slot_count;
        let last_server_time = header.last_server_time;

        std::os::unix::fs::FileExt::write_all_at(&file, &header.to_bytes(), 0)?;

        let vault = Self {
            file,
            arena: crate::secure::SecureArena::create(),
            salt: new_salt,
            derived_key: Secret::new(new_wrap),
            master: Secret::new(master),
            index,
            slot_count,
            last_server_time,
            current: None,
        };
        vault.rehash_and_append(crate::config::HASH_SIZE as u64)?;
        vault.sync()?;

        let mut header_108 = [0u8; 108];
        let full = header.to_bytes();
        header_108.copy_from_slice(&full[..108]);

        let second_pass_salt: [u8; SALT_SIZE] = random::fill()?;
        let server_pass = create_password_for_server(vault.derived_key.expose_secret(), &second_pass_salt)?;

        Ok((vault, header_108, server_pass))
    }

    /// Derives the server-visible password from an already-open vault's
    /// wrapping key, equivalent to [`create_password_for_server`] but without
    /// exposing `derived_key` outside the crate.
    #[instrument(skip(self, second_pass_salt))]
    pub fn create_password_for_server(&self, second_pass_salt: &[u8; SALT_SIZE]) -> VaultResult<Vec<u8>> {
        let _guard = self.arena.enable_rw()?;
        create_password_for_server(self.derived_key.expose_secret(), second_pass_salt)
    }
}

/// Double-KDF helper: derives the server-visible password from a wrapping
/// key and a salt. Exposed standalone so the caller can recompute it after
/// [`Vault::update_key_from_recovery`] without reopening the vault.
pub fn create_password_for_server(derived_key: &[u8; MASTER_KEY_SIZE], second_pass_salt: &[u8; SALT_SIZE]) -> VaultResult<Vec<u8>> {
    Ok(kdf::derive(derived_key, second_pass_salt)?.to_vec())
}

/// Double-KDF helper: derives the server-visible password directly from
/// `password` and the vault's `first_pass_salt` (the header salt) plus a
/// `second_pass_salt`, without needing an open vault at all.
pub fn make_password_for_server(password: &[u8], first_pass_salt: &[u8; SALT_SIZE], second_pass_salt: &[u8; SALT_SIZE]) -> VaultResult<Vec<u8>> {
    let derived_key = kdf::derive(password, first_pass_salt)?;
    create_password_for_server(&derived_key, second_pass_salt)
}

/// Recomputes `dataencr_1`/`dataencr_2` from fresh answers and the four
/// salts embedded in a [`RecoveryBlob`], so the caller can reprove knowledge
/// of `r1`/`r2` on a later login without ever decrypting the blob.
#[instrument(skip(r1, r2))]
pub fn create_responses_for_server(
    r1: &[u8],
    r2: &[u8],
    data_salt_11: &[u8; SALT_SIZE],
    data_salt_12: &[u8; SALT_SIZE],
    data_salt_21: &[u8; SALT_SIZE],
    data_salt_22: &[u8; SALT_SIZE],
) -> VaultResult<(Vec<u8>, Vec<u8>)> {
    let data1_master = kdf::derive(r1, data_salt_11)?;
    let data2_master = kdf::derive(r2, data_salt_21)?;
    let dataencr_1 = kdf::derive(&data1_master, data_salt_12)?.to_vec();
    let dataencr_2 = kdf::derive(&data2_master, data_salt_22)?.to_vec();
    Ok((dataencr_1, dataencr_2))
}
