//! The Engine: composes the Secure Memory Arena, Crypto Facade, File Codec,
//! and Key Index into the public vault operations of §4.5.
//!
//! The C original threads a single reusable `VaultInfo` handle through
//! `init`/`create`/`open`/`close`/`release` calls. Rust's ownership model
//! gives the same guarantees for free: a [`Vault`] only exists while a file
//! is open, its `Drop` impl (via the fields' own `Drop`s) closes the file,
//! releases the advisory lock, and zeroizes every secret, and there is no
//! reachable state in which a `Vault` value refers to a closed file. This is
//! why `VOPEN`/`VCLOSE` have no call site below: the type system already
//! rules out the misuse they guarded against in the original API.

pub mod access;
pub mod lifecycle;
pub mod mutate;
pub mod password;
pub mod recovery;

use std::fs::File;

use fs2::FileExt;

use crate::codec::header::Header;
use crate::config::{BOX_KEY_SIZE, DATA_SIZE, HEADER_SIZE, MASTER_KEY_SIZE, VAULT_FILE_SUFFIX};
use crate::error::{VaultError, VaultResult};
use crate::index::KeyIndex;
use crate::secret::Secret;

/// A 32-byte secret that zeroizes on drop: the decrypted master key or the
/// password-derived wrapping key.
pub(crate) type SecretKey = Secret<[u8; MASTER_KEY_SIZE]>;

/// The value currently returned by the most recent `open_key`, held in
/// secure memory until overwritten by another `open_key` or wiped by
/// `close` (§3.5).
pub(crate) struct OpenValue {
    pub key: Vec<u8>,
    pub entry_type: u8,
    pub value: Secret<Vec<u8>>,
}

/// An open vault: the file handle, its cryptographic material, and the
/// in-memory key index. Corresponds to `VaultInfo` (§3.3), minus the
/// secure-memory arena's no-access/read-write bookkeeping for `is_open`,
/// which Rust's ownership already provides.
pub struct Vault {
    pub(crate) file: File,
    pub(crate) arena: crate::secure::SecureArena,
    pub(crate) salt: [u8; crate::config::SALT_SIZE],
    pub(crate) derived_key: SecretKey,
    pub(crate) master: SecretKey,
    pub(crate) index: KeyIndex,
    pub(crate) slot_count: u32,
    pub(crate) last_server_time: u64,
    pub(crate) current: Option<OpenValue>,
}

impl Vault {
    /// Reads the 112-byte header from the start of the file.
    pub(crate) fn read_header(&self) -> VaultResult<Header> {
        let mut buf = [0u8; HEADER_SIZE];
        std::os::unix::fs::FileExt::read_exact_at(&self.file, &mut buf, 0).map_err(|_| VaultError::IoErr)?;
        Header::from_bytes(&buf)
    }

    /// Writes a full 112-byte header at the start of the file.
    pub(crate) fn write_header(&self, header: &Header) -> VaultResult<()> {
        std::os::unix::fs::FileExt::write_all_at(&self.file, &header.to_bytes(), 0).map_err(|_| VaultError::IoErr)
    }

    /// Recomputes the whole-file MAC and writes it at its proper location.
    ///
    /// `omit_trailing` is `0` when the file does not yet carry a trailing
    /// MAC (the common case right after appending a new entry, which
    /// overwrote the previous one), or `HASH_SIZE` to recompute in place
    /// over an existing trailing MAC whose preceding bytes changed (header
    /// rewrites, deletions, server-time bookkeeping).
    pub(crate) fn rehash_and_append(&self, omit_trailing: u64) -> VaultResult<()> {
        let mac = crate::codec::entry::rehash_file(&self.file, self.master.expose_secret(), omit_trailing)?;
        let at = crate::codec::entry::file_len(&self.file)?.checked_sub(omit_trailing).ok_or(VaultError::File)?;
        crate::codec::entry::write_entry(&self.file, at, &mac)
    }

    fn sync(&self) -> VaultResult<()> {
        self.file.sync_data().map_err(|_| VaultError::IoErr)
    }
}

impl Drop for Vault {
    fn drop(&mut self) {
        self.index.clear();
        // `self.file`'s own `Drop` closes the descriptor, which releases the
        // `fs2` advisory lock; `self.master`/`self.derived_key`/`self.current`
        // zeroize via their own `Drop` impls. Nothing further to do here —
        // this satisfies §4.5.5's close contract without a ported
        // multi-step teardown routine.
    }
}

/// Validates a candidate key: non-empty and short enough to leave room for
/// the null terminator the C wire format reserves within `BOX_KEY_SIZE`.
pub(crate) fn validate_key(key: &[u8]) -> VaultResult<()> {
    if key.is_empty() || key.len() >= BOX_KEY_SIZE {
        return Err(VaultError::ParamErr);
    }
    Ok(())
}

/// Validates a candidate value against the maximum plaintext size.
pub(crate) fn validate_value(value: &[u8]) -> VaultResult<()> {
    if value.len() > DATA_SIZE {
        return Err(VaultError::ParamErr);
    }
    Ok(())
}

/// Builds `{directory}/{username}.vault`, bounds-checking each component
/// per §4.5.2's `MAX_PATH_LEN`/`MAX_USER_SIZE`.
pub(crate) fn vault_path(directory: &str, username: &str, password: &[u8]) -> VaultResult<std::path::PathBuf> {
    if directory.len() > crate::config::MAX_PATH_LEN
        || username.is_empty()
        || username.len() > crate::config::MAX_USER_SIZE
        || password.len() > crate::config::MAX_PASS_SIZE
    {
        return Err(VaultError::ParamErr);
    }
    Ok(std::path::Path::new(directory).join(format!("{username}{VAULT_FILE_SUFFIX}")))
}

/// Acquires a non-blocking exclusive advisory lock on `file`, per §5's
/// single-process-at-a-time concurrency model.
pub(crate) fn lock_exclusive(file: &File) -> VaultResult<()> {
    file.try_lock_exclusive().map_err(|_| VaultError::Syscall)
}

/// The maximum plaintext value length accepted by `add_key`/`update_key`.
#[must_use]
pub fn max_value_size() -> usize {
    DATA_SIZE
}
