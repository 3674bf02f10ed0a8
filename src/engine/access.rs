//! `open_key`/`place_open_value`/`get_encrypted_value`/accessors
//! (§4.5.8–4.5.9, §4.5.15–4.5.16).

use tracing::instrument;

use super::{OpenValue, Vault};
use crate::codec::entry::{self, EntryView};
use crate::codec::slot::read_slot_at;
use crate::config::{BOX_KEY_SIZE, HASH_SIZE, HEADER_SIZE, NONCE_SIZE};
use crate::crypto::{hash, secretbox};
use crate::error::{VaultError, VaultResult};
use crate::secret::Secret;

impl Vault {
    /// Decrypts `key`'s value into the current box, per §4.5.8. Repeating
    /// `open_key` for the already-open key is a no-op that touches no I/O.
    #[instrument(skip(self), fields(key_len = key.len()))]
    pub fn open_key(&mut self, key: &[u8]) -> VaultResult<()> {
        let _guard = self.arena.enable_rw()?;

        if let Some(current) = &self.current {
            if current.key == key {
                return Ok(());
            }
        }

        let entry = self.index.get(key).copied().ok_or(VaultError::KeyExist)?;
        let slot = read_slot_at(&self.file, entry.inode_loc)?;
        let total_len = crate::codec::entry::entry_len(slot.key_len as usize, slot.val_len as usize);
        let raw = entry::read_entry(&self.file, u64::from(slot.file_offset), total_len)?;
        let view = EntryView::parse(&raw, slot.key_len as usize, slot.val_len as usize)?;

        let master = *self.master.expose_secret();
        let expected: [u8; HASH_SIZE] = view.entry_mac().try_into().map_err(|_| VaultError::File)?;
        hash::verify(view.bytes_sans_mac(), &master, &expected).map_err(|_| VaultError::CryptoErr)?;

        let nonce: [u8; NONCE_SIZE] = view.nonce().try_into().map_err(|_| VaultError::CryptoErr)?;
        let plaintext = secretbox::decrypt(view.ciphertext(), &nonce, &master)?;

        self.current = Some(OpenValue { key: key.to_vec(), entry_type: view.entry_type(), value: Secret::new(plaintext) });
        Ok(())
    }

    /// Copies the currently opened value into `out_buf`, null-terminated,
    /// per §4.5.9. `out_buf` must be at least `DATA_SIZE + 1` bytes.
    #[instrument(skip(self, out_buf))]
    pub fn place_open_value(&self, out_buf: &mut [u8]) -> VaultResult<(usize, u8)> {
        let _guard = self.arena.enable_rw()?;
        let current = self.current.as_ref().ok_or(VaultError::KeyExist)?;
        let value = current.value.expose_secret();
        if out_buf.len() < value.len() + 1 {
            return Err(VaultError::ParamErr);
        }
        out_buf[..value.len()].copy_from_slice(value);
        out_buf[value.len()] = 0;
        Ok((value.len(), current.entry_type))
    }

    /// Reads `key`'s entry verbatim, for export to the remote backup
    /// service, per §4.5.15. Inverse of `add_encrypted_value`.
    #[instrument(skip(self), fields(key_len = key.len()))]
    pub fn get_encrypted_value(&self, key: &[u8]) -> VaultResult<(Vec<u8>, u8)> {
        let _guard = self.arena.enable_rw()?;
        let entry = self.index.get(key).copied().ok_or(VaultError::KeyExist)?;
        let slot = read_slot_at(&self.file, entry.inode_loc)?;
        let total_len = crate::codec::entry::entry_len(slot.key_len as usize, slot.val_len as usize);
        let raw = entry::read_entry(&self.file, u64::from(slot.file_offset), total_len)?;
        let view = EntryView::parse(&raw, slot.key_len as usize, slot.val_len as usize)?;

        let master = *self.master.expose_secret();
        let expected: [u8; HASH_SIZE] = view.entry_mac().try_into().map_err(|_| VaultError::File)?;
        hash::verify(view.bytes_sans_mac(), &master, &expected).map_err(|_| VaultError::CryptoErr)?;

        Ok((raw, view.entry_type()))
    }

    /// Number of live keys, per §4.5.16.
    #[instrument(skip(self))]
    pub fn num_vault_keys(&self) -> VaultResult<usize> {
        let _guard = self.arena.enable_rw()?;
        Ok(self.index.len())
    }

    /// All live keys, in arbitrary order. The C surface hands the caller an
    /// array of `BOX_KEY_SIZE`-sized buffers to fill; the idiomatic Rust
    /// surface returns owned, exactly-sized `Vec<u8>`s instead.
    #[instrument(skip(self))]
    pub fn get_vault_keys(&self) -> VaultResult<Vec<Vec<u8>>> {
        let _guard = self.arena.enable_rw()?;
        let keys: Vec<Vec<u8>> = self.index.keys().cloned().collect();
        debug_assert!(keys.iter().all(|k| k.len() < BOX_KEY_SIZE));
        Ok(keys)
    }

    /// The `mtime` passed to the most recent `add_key`/`update_key` for
    /// `key`, per §4.5.16.
    #[instrument(skip(self), fields(key_len = key.len()))]
    pub fn last_modified_time(&self, key: &[u8]) -> VaultResult<u64> {
        let _guard = self.arena.enable_rw()?;
        self.index.get(key).map(|entry| entry.m_time).ok_or(VaultError::KeyExist)
    }

    /// The first 108 bytes of the header, suitable for upload to the
    /// remote backup service via `create_from_header`, per §4.5.16.
    #[instrument(skip(self))]
    pub fn get_header(&self) -> VaultResult<[u8; 108]> {
        let _guard = self.arena.enable_rw()?;
        let mut buf = [0u8; HEADER_SIZE];
        std::os::unix::fs::FileExt::read_exact_at(&self.file, &mut buf, 0).map_err(|_| VaultError::IoErr)?;
        let mut out = [0u8; 108];
        out.copy_from_slice(&buf[..108]);
        Ok(out)
    }

    /// The last recorded server-sync timestamp, per §4.5.16.
    #[instrument(skip(self))]
    pub fn get_last_server_time(&self) -> VaultResult<u64> {
        let _guard = self.arena.enable_rw()?;
        Ok(self.last_server_time)
    }

    /// Records a new server-sync timestamp. Per §9 Open Question 3, this
    /// must refresh the file MAC — a bare field write without rehashing
    /// would leave the file unverifiable on the next open.
    #[instrument(skip(self))]
    pub fn set_last_server_time(&mut self, timestamp: u64) -> VaultResult<()> {
        let _guard = self.arena.enable_rw()?;
        let mut header = self.read_header()?;
        header.last_server_time = timestamp;
        self.write_header(&header)?;
        self.rehash_and_append(HASH_SIZE as u64)?;
        self.sync()?;
        self.last_server_time = timestamp;
        Ok(())
    }
}
