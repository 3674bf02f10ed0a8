//! `init`/`release`/`create`/`open`/`close`/`create_from_header` (§4.5.1–4.5.5).

use std::fs::OpenOptions;
use std::os::unix::fs::OpenOptionsExt;

use tracing::instrument;

use super::{Vault, lock_exclusive, vault_path};
use crate::codec::header::Header;
use crate::codec::slot::{SlotDescriptor, write_slot};
use crate::config::{HEADER_SIZE, INITIAL_SIZE, MASTER_KEY_SIZE, NONCE_SIZE, SALT_SIZE};
use crate::crypto::{kdf, random, secretbox};
use crate::error::{VaultError, VaultResult};
use crate::index::KeyIndex;
use crate::secret::Secret;

impl Vault {
    /// Creates a fresh vault at `{directory}/{username}.vault` under
    /// `password`, per §4.5.2.
    #[instrument(skip(password), fields(user_len = username.len()))]
    pub fn create(directory: &str, username: &str, password: &[u8]) -> VaultResult<Self> {
        let path = vault_path(directory, username, password)?;

        let file = OpenOptions::new().read(true).write(true).create_new(true).mode(0o600).open(&path)?;
        lock_exclusive(&file)?;

        let master = secretbox::keygen()?;
        let salt: [u8; SALT_SIZE] = random::fill()?;
        let nonce: [u8; NONCE_SIZE] = random::fill()?;
        let derived_key = kdf::derive(password, &salt)?;
        let encrypted_master = secretbox::encrypt(&master, &nonce, &derived_key)?;

        let header = Header {
            version: crate::config::VERSION,
            salt,
            encrypted_master: encrypted_master.try_into().map_err(|_| VaultError::CryptoErr)?,
            master_nonce: nonce,
            last_server_time: 0,
            slot_count: INITIAL_SIZE,
        };

        std::os::unix::fs::FileExt::write_all_at(&file, &header.to_bytes(), 0)?;
        for i in 0..INITIAL_SIZE {
            write_slot(&file, i, SlotDescriptor::ZERO)?;
        }

        let vault = Self {
            file,
            arena: crate::secure::SecureArena::create(),
            salt,
            derived_key: Secret::new(derived_key),
            master: Secret::new(master),
            index: KeyIndex::init(INITIAL_SIZE as usize),
            slot_count: INITIAL_SIZE,
            last_server_time: 0,
            current: None,
        };

        vault.rehash_and_append(0)?;
        vault.sync()?;
        Ok(vault)
    }

    /// Opens an existing vault under `password`, per §4.5.3.
    #[instrument(skip(password), fields(user_len = username.len()))]
    pub fn open(directory: &str, username: &str, password: &[u8]) -> VaultResult<Self> {
        let path = vault_path(directory, username, password)?;

        // §4.5.3 requires opening "without following symlinks," so a
        // symlinked vault path can't be swapped out from under the caller
        // between path construction and open.
        let file = OpenOptions::new().read(true).write(true).custom_flags(libc::O_NOFOLLOW).open(&path)?;
        lock_exclusive(&file)?;

        let mut header_buf = [0u8; HEADER_SIZE];
        std::os::unix::fs::FileExt::read_exact_at(&file, &mut header_buf, 0).map_err(|_| VaultError::IoErr)?;
        let header = Header::from_bytes(&header_buf)?;

        let derived_key = kdf::derive(password, &header.salt)?;
        let master_vec = secretbox::decrypt(&header.encrypted_master, &header.master_nonce, &derived_key)
            .map_err(|_| VaultError::WrongPass)?;
        let master: [u8; MASTER_KEY_SIZE] = master_vec.try_into().map_err(|_| VaultError::WrongPass)?;

        let file_len = crate::codec::entry::file_len(&file)?;
        let mut trailing = [0u8; crate::config::HASH_SIZE];
        std::os::unix::fs::FileExt::read_exact_at(
            &file,
            &mut trailing,
            file_len - crate::config::HASH_SIZE as u64,
        )
        .map_err(|_| VaultError::IoErr)?;
        let recomputed = crate::codec::entry::rehash_file(&file, &master, crate::config::HASH_SIZE as u64)?;
        if !bool::from(subtle::ConstantTimeEq::ct_eq(&recomputed[..], &trailing[..])) {
            return Err(VaultError::File);
        }

        let index = KeyIndex::rebuild_from_file(&file, &header)?;

        Ok(Self {
            file,
            arena: crate::secure::SecureArena::create(),
            salt: header.salt,
            derived_key: Secret::new(derived_key),
            master: Secret::new(master),
            index,
            slot_count: header.slot_count,
            last_server_time: header.last_server_time,
            current: None,
        })
    }

    /// Creates a local vault from a 108-byte header retrieved from the
    /// remote backup service (§4.5.4). Every error path below closes the
    /// file and releases its lock for free: `file` is a local binding that
    /// is dropped on any early return via `?`.
    #[instrument(skip(password, header_108), fields(user_len = username.len()))]
    pub fn create_from_header(directory: &str, username: &str, password: &[u8], header_108: &[u8; 108]) -> VaultResult<Self> {
        let path = vault_path(directory, username, password)?;

        let mut full = [0u8; HEADER_SIZE];
        full[..108].copy_from_slice(header_108);
        full[108..].copy_from_slice(&INITIAL_SIZE.to_le_bytes());
        let header = Header::from_bytes(&full)?;

        let derived_key = kdf::derive(password, &header.salt)?;
        let master_vec = secretbox::decrypt(&header.encrypted_master, &header.master_nonce, &derived_key)
            .map_err(|_| VaultError::WrongPass)?;
        let master: [u8; MASTER_KEY_SIZE] = master_vec.try_into().map_err(|_| VaultError::WrongPass)?;

        let file = OpenOptions::new().read(true).write(true).create_new(true).mode(0o600).open(&path)?;
        lock_exclusive(&file)?;

        std::os::unix::fs::FileExt::write_all_at(&file, &header.to_bytes(), 0)?;
        for i in 0..INITIAL_SIZE {
            write_slot(&file, i, SlotDescriptor::ZERO)?;
        }

        let vault = Self {
            file,
            arena: crate::secure::SecureArena::create(),
            salt: header.salt,
            derived_key: Secret::new(derived_key),
            master: Secret::new(master),
            index: KeyIndex::init(INITIAL_SIZE as usize),
            slot_count: INITIAL_SIZE,
            last_server_time: header.last_server_time,
            current: None,
        };

        vault.rehash_and_append(0)?;
        vault.sync()?;
        Ok(vault)
    }

    /// Closes the vault. Consuming `self` drops the file (closing the
    /// descriptor and releasing the advisory lock) and zeroizes every
    /// secret the vault was holding (§4.5.5).
    #[instrument(skip(self))]
    pub fn close(self) {
        drop(self);
    }
}
