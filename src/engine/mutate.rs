//! `add_key`/`add_encrypted_value`/`delete_key`/`update_key`/`compact`
//! (§4.5.6–4.5.7, §4.5.10–4.5.12).

use tracing::instrument;

use super::{Vault, validate_key, validate_value};
use crate::codec::entry::{self, entry_len};
use crate::codec::slot::{SlotDescriptor, read_slot, read_slot_at, write_slot, write_slot_at};
use crate::config::{ENTRY_HEADER_SIZE, HASH_SIZE, MAC_SIZE, NONCE_SIZE, SLOT_ACTIVE, SLOT_DELETED};
use crate::crypto::{hash, random, secretbox};
use crate::error::{VaultError, VaultResult};
use crate::index::{KeyIndexEntry, find_unused_slot};

impl Vault {
    /// Appends a new key/value pair, per §4.5.6.
    #[instrument(skip(self, value), fields(key_len = key.len(), val_len = value.len()))]
    pub fn add_key(&mut self, entry_type: u8, key: &[u8], value: &[u8], mtime: u64) -> VaultResult<()> {
        let _guard = self.arena.enable_rw()?;
        validate_key(key)?;
        validate_value(value)?;
        if self.index.get(key).is_some() {
            return Err(VaultError::KeyExist);
        }

        let master = *self.master.expose_secret();
        let nonce: [u8; NONCE_SIZE] = random::fill()?;
        let ciphertext = secretbox::encrypt(value, &nonce, &master)?;
        let body = entry::frame(mtime, entry_type, key, &ciphertext, &nonce);
        let entry_mac = hash::keyed_hash(&body, &master);
        let mut full = body;
        full.extend_from_slice(&entry_mac);

        self.store_entry(key, mtime, entry_type, key.len() as u32, value.len() as u32, &full)
    }

    /// Imports an opaque entry returned by the remote service, per §4.5.7.
    #[instrument(skip(self, entry_bytes), fields(key_len = key.len(), entry_len = entry_bytes.len()))]
    pub fn add_encrypted_value(&mut self, key: &[u8], entry_bytes: &[u8], entry_type: u8, mtime: u64) -> VaultResult<()> {
        let _guard = self.arena.enable_rw()?;
        validate_key(key)?;
        if self.index.get(key).is_some() {
            return Err(VaultError::KeyExist);
        }
        if entry_bytes.len() < ENTRY_HEADER_SIZE + key.len() + MAC_SIZE + NONCE_SIZE + HASH_SIZE {
            return Err(VaultError::ParamErr);
        }
        let val_len = entry_bytes.len() - ENTRY_HEADER_SIZE - key.len() - MAC_SIZE - NONCE_SIZE - HASH_SIZE;
        validate_value_len(val_len)?;

        let master = *self.master.expose_secret();
        let sans_mac = &entry_bytes[..entry_bytes.len() - HASH_SIZE];
        hash::verify(sans_mac, &master, entry_bytes[entry_bytes.len() - HASH_SIZE..].try_into().map_err(|_| VaultError::File)?)
            .map_err(|_| VaultError::File)?;

        let mut full = entry_bytes.to_vec();
        full[0..8].copy_from_slice(&mtime.to_le_bytes());
        let new_mac = hash::keyed_hash(&full[..full.len() - HASH_SIZE], &master);
        full[full.len() - HASH_SIZE..].copy_from_slice(&new_mac);

        self.store_entry(key, mtime, entry_type, key.len() as u32, val_len as u32, &full)
    }

    /// Deletes `key`: marks its slot `DELETED` and zeroes the ciphertext
    /// region in place, per §4.5.10.
    #[instrument(skip(self), fields(key_len = key.len()))]
    pub fn delete_key(&mut self, key: &[u8]) -> VaultResult<()> {
        let _guard = self.arena.enable_rw()?;
        let entry = self.index.get(key).copied().ok_or(VaultError::KeyExist)?;
        let slot = read_slot_at(&self.file, entry.inode_loc)?;

        self.index.remove(key);

        write_slot_at(
            &self.file,
            entry.inode_loc,
            SlotDescriptor { state: SLOT_DELETED, file_offset: slot.file_offset, key_len: slot.key_len, val_len: slot.val_len },
        )?;

        let zero_offset = u64::from(slot.file_offset) + ENTRY_HEADER_SIZE as u64 + u64::from(slot.key_len);
        let zero_len = slot.val_len as usize + MAC_SIZE;
        entry::write_entry(&self.file, zero_offset, &vec![0u8; zero_len])?;

        self.rehash_and_append(HASH_SIZE as u64)?;
        self.sync()
    }

    /// `delete_key` followed by `add_key`, per §4.5.11. If the delete fails
    /// the add is never attempted — the error propagates via `?` before
    /// `add_key` is reached.
    #[instrument(skip(self, value), fields(key_len = key.len(), val_len = value.len()))]
    pub fn update_key(&mut self, entry_type: u8, key: &[u8], value: &[u8], mtime: u64) -> VaultResult<()> {
        self.delete_key(key)?;
        self.add_key(entry_type, key, value, mtime)
    }

    /// Reclaims `DELETED` slots and their heap bytes, and doubles the slot
    /// table's capacity, per §4.5.12.
    #[instrument(skip(self))]
    pub fn compact(&mut self) -> VaultResult<()> {
        let _guard = self.arena.enable_rw()?;
        self.compact_internal()
    }

    /// The actual compaction algorithm, callable both from the public
    /// `compact` (guard acquired above) and from `add_key`/
    /// `add_encrypted_value`'s internal NOSPACE retry, which already holds
    /// the arena's read-write guard for the duration of its call — nesting
    /// `enable_rw` a second time would trip the arena's own reentrancy
    /// check (§9 Open Question 1 applies to the guard itself, not to
    /// recursive acquisition).
    pub(crate) fn compact_internal(&mut self) -> VaultResult<()> {
        let header = self.read_header()?;
        let slot_count = header.slot_count;
        let heap_start = crate::config::HEADER_SIZE as u64 + u64::from(slot_count) * crate::config::LOC_SIZE as u64;
        let file_len = entry::file_len(&self.file)?;
        let heap_end = file_len.checked_sub(HASH_SIZE as u64).ok_or(VaultError::File)?;
        let heap_len = usize::try_from(heap_end - heap_start).map_err(|_| VaultError::IoErr)?;
        let heap = entry::read_entry(&self.file, heap_start, heap_len)?;

        let mut slots = Vec::with_capacity(slot_count as usize);
        for i in 0..slot_count {
            slots.push(read_slot(&self.file, i)?);
        }

        let new_slot_count = slot_count * 2;
        let new_heap_start = crate::config::HEADER_SIZE as u64 + u64::from(new_slot_count) * crate::config::LOC_SIZE as u64;

        let mut new_heap: Vec<u8> = Vec::with_capacity(heap_len);
        let mut new_slots = vec![SlotDescriptor::ZERO; new_slot_count as usize];
        let mut loc_idx = 0usize;

        for slot in &slots {
            if slot.is_active() {
                let old_offset = usize::try_from(u64::from(slot.file_offset) - heap_start).map_err(|_| VaultError::IoErr)?;
                let len = entry_len(slot.key_len as usize, slot.val_len as usize);
                let new_offset = new_heap_start + new_heap.len() as u64;
                new_heap.extend_from_slice(&heap[old_offset..old_offset + len]);
                new_slots[loc_idx] = SlotDescriptor {
                    state: SLOT_ACTIVE,
                    file_offset: u32::try_from(new_offset).map_err(|_| VaultError::IoErr)?,
                    key_len: slot.key_len,
                    val_len: slot.val_len,
                };
                loc_idx += 1;
            } else if slot.is_deleted() {
                continue;
            } else {
                break;
            }
        }

        let mut new_header = header.clone();
        new_header.slot_count = new_slot_count;
        self.write_header(&new_header)?;
        for (i, desc) in new_slots.iter().enumerate() {
            write_slot(&self.file, i as u32, *desc)?;
        }
        entry::write_entry(&self.file, new_heap_start, &new_heap)?;
        entry::truncate(&self.file, new_heap_start + new_heap.len() as u64)?;

        self.rehash_and_append(0)?;
        self.sync()?;

        self.index = crate::index::KeyIndex::rebuild_from_file(&self.file, &new_header)?;
        self.slot_count = new_slot_count;
        Ok(())
    }

    /// Shared tail of `add_key`/`add_encrypted_value`: find a free slot
    /// (compacting once if the table is full), write the entry, update the
    /// slot descriptor, refresh the file MAC, and index the key.
    fn store_entry(&mut self, key: &[u8], mtime: u64, entry_type: u8, key_len: u32, val_len: u32, full: &[u8]) -> VaultResult<()> {
        let mut slot_idx = find_unused_slot(&self.file, self.slot_count)?;
        if slot_idx.is_none() {
            self.compact_internal()?;
            slot_idx = find_unused_slot(&self.file, self.slot_count)?;
        }
        let slot_idx = slot_idx.ok_or(VaultError::NoSpace)?;

        let offset = entry::file_len(&self.file)?.checked_sub(HASH_SIZE as u64).ok_or(VaultError::File)?;
        entry::write_entry(&self.file, offset, full)?;
        write_slot(
            &self.file,
            slot_idx,
            SlotDescriptor {
                state: SLOT_ACTIVE,
                file_offset: u32::try_from(offset).map_err(|_| VaultError::IoErr)?,
                key_len,
                val_len,
            },
        )?;
        self.rehash_and_append(0)?;
        self.sync()?;

        self.index.put(
            key.to_vec(),
            KeyIndexEntry { inode_loc: crate::codec::slot::slot_offset(slot_idx), m_time: mtime, entry_type },
        );
        Ok(())
    }
}

fn validate_value_len(val_len: usize) -> VaultResult<()> {
    if val_len > crate::config::DATA_SIZE {
        return Err(VaultError::ParamErr);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;
    use crate::config::INITIAL_SIZE;

    fn new_vault() -> Vault {
        let dir = tempdir().unwrap();
        Vault::create(dir.path().to_str().unwrap(), "alice", b"hunter2").unwrap()
    }

    #[test]
    fn add_then_open_round_trips() {
        let mut vault = new_vault();
        vault.add_key(1, b"email", b"a@b", 1000).unwrap();
        vault.open_key(b"email").unwrap();
        let mut buf = [0u8; 64];
        let (len, ty) = vault.place_open_value(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"a@b");
        assert_eq!(ty, 1);
    }

    #[test]
    fn add_duplicate_key_fails() {
        let mut vault = new_vault();
        vault.add_key(1, b"email", b"a@b", 1000).unwrap();
        let err = vault.add_key(1, b"email", b"c@d", 1001).unwrap_err();
        assert_eq!(err, VaultError::KeyExist);
    }

    #[test]
    fn delete_then_open_key_fails() {
        let mut vault = new_vault();
        vault.add_key(1, b"email", b"a@b", 1000).unwrap();
        vault.delete_key(b"email").unwrap();
        let err = vault.open_key(b"email").unwrap_err();
        assert_eq!(err, VaultError::KeyExist);
    }

    #[test]
    fn delete_zeroes_ciphertext_region() {
        let mut vault = new_vault();
        vault.add_key(1, b"email", b"a@b", 1000).unwrap();
        let entry = vault.index.get(b"email").copied().unwrap();
        let slot = read_slot_at(&vault.file, entry.inode_loc).unwrap();
        vault.delete_key(b"email").unwrap();

        let zero_offset = u64::from(slot.file_offset) + ENTRY_HEADER_SIZE as u64 + u64::from(slot.key_len);
        let zero_len = slot.val_len as usize + MAC_SIZE;
        let region = entry::read_entry(&vault.file, zero_offset, zero_len).unwrap();
        assert!(region.iter().all(|&b| b == 0));
    }

    #[test]
    fn update_key_replaces_value_without_changing_count() {
        let mut vault = new_vault();
        vault.add_key(1, b"email", b"a@b", 1000).unwrap();
        vault.update_key(1, b"email", b"new@value", 2000).unwrap();
        assert_eq!(vault.num_vault_keys().unwrap(), 1);
        vault.open_key(b"email").unwrap();
        let mut buf = [0u8; 64];
        let (len, _) = vault.place_open_value(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"new@value");
        assert_eq!(vault.last_modified_time(b"email").unwrap(), 2000);
    }

    #[test]
    fn compaction_preserves_contents_and_doubles_slots() {
        let mut vault = new_vault();
        for i in 0..INITIAL_SIZE {
            let key = format!("key{i}");
            vault.add_key(1, key.as_bytes(), b"v", u64::from(i)).unwrap();
        }
        // The table is now full; this add forces a compaction internally.
        vault.add_key(1, b"one_more", b"v2", 999).unwrap();
        assert_eq!(vault.num_vault_keys().unwrap(), INITIAL_SIZE as usize + 1);
        assert_eq!(vault.slot_count, INITIAL_SIZE * 2);

        vault.open_key(b"one_more").unwrap();
        let mut buf = [0u8; 64];
        let (len, _) = vault.place_open_value(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"v2");
    }

    #[test]
    fn explicit_compact_reclaims_deleted_slots() {
        let mut vault = new_vault();
        vault.add_key(1, b"a", b"1", 1).unwrap();
        vault.add_key(1, b"b", b"2", 2).unwrap();
        vault.delete_key(b"a").unwrap();
        let before = vault.slot_count;
        vault.compact().unwrap();
        assert_eq!(vault.slot_count, before * 2);
        assert_eq!(vault.num_vault_keys().unwrap(), 1);
        vault.open_key(b"b").unwrap();
    }

    #[test]
    fn empty_key_is_rejected() {
        let mut vault = new_vault();
        let err = vault.add_key(1, b"", b"v", 1).unwrap_err();
        assert_eq!(err, VaultError::ParamErr);
    }

    #[test]
    fn key_length_just_under_box_key_size_is_accepted() {
        let mut vault = new_vault();
        let key = vec![b'k'; crate::config::BOX_KEY_SIZE - 1];
        vault.add_key(1, &key, b"v", 1).unwrap();
        assert_eq!(vault.num_vault_keys().unwrap(), 1);
    }

    #[test]
    fn key_length_at_box_key_size_is_rejected() {
        let mut vault = new_vault();
        let key = vec![b'k'; crate::config::BOX_KEY_SIZE];
        let err = vault.add_key(1, &key, b"v", 1).unwrap_err();
        assert_eq!(err, VaultError::ParamErr);
    }

    #[test]
    fn value_length_at_data_size_is_accepted() {
        let mut vault = new_vault();
        let value = vec![b'v'; crate::config::DATA_SIZE];
        vault.add_key(1, b"k", &value, 1).unwrap();
        vault.open_key(b"k").unwrap();
        let mut buf = vec![0u8; crate::config::DATA_SIZE + 1];
        let (len, _) = vault.place_open_value(&mut buf).unwrap();
        assert_eq!(len, crate::config::DATA_SIZE);
    }

    #[test]
    fn value_length_over_data_size_is_rejected() {
        let mut vault = new_vault();
        let value = vec![b'v'; crate::config::DATA_SIZE + 1];
        let err = vault.add_key(1, b"k", &value, 1).unwrap_err();
        assert_eq!(err, VaultError::ParamErr);
    }
}
