//! Slot Table & Key Index: maps keys to slot descriptors, rebuilt in memory
//! from the on-disk slot table on every open.

use hashbrown::HashMap;
use std::os::unix::fs::FileExt;

use crate::codec::header::Header;
use crate::codec::slot::{read_slot, slot_offset};
use crate::config::ENTRY_HEADER_SIZE;
use crate::error::{VaultError, VaultResult};

/// What the index remembers about one live key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyIndexEntry {
    /// Byte offset of this key's slot descriptor in the slot table.
    pub inode_loc: u64,
    pub m_time: u64,
    pub entry_type: u8,
}

/// In-memory key → slot-descriptor-location map, strictly owning its
/// entries: removing a key destroys its `KeyIndexEntry`.
#[derive(Debug, Default)]
pub struct KeyIndex {
    map: HashMap<Vec<u8>, KeyIndexEntry>,
}

impl KeyIndex {
    /// Creates an index with bucket capacity hinted by `capacity / 2`; the
    /// map resizes on its own past that, collisions included.
    #[must_use]
    pub fn init(capacity: usize) -> Self {
        Self { map: HashMap::with_capacity(capacity / 2) }
    }

    pub fn put(&mut self, key: Vec<u8>, entry: KeyIndexEntry) {
        self.map.insert(key, entry);
    }

    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&KeyIndexEntry> {
        self.map.get(key)
    }

    pub fn remove(&mut self, key: &[u8]) -> Option<KeyIndexEntry> {
        self.map.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.map.keys()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn clear(&mut self) {
        self.map.clear();
    }

    /// Rebuilds the index from the slot table of an open file, per §4.4.
    /// Only inspects `mtime`/`type`/`key` out of each active entry's header
    /// — never the ciphertext.
    pub fn rebuild_from_file(file: &std::fs::File, header: &Header) -> VaultResult<Self> {
        let mut index = Self::init(header.slot_count as usize);

        for i in 0..header.slot_count {
            let slot = read_slot(file, i)?;
            if !slot.is_active() {
                continue;
            }

            let key_len = slot.key_len as usize;
            let mut buf = vec![0u8; ENTRY_HEADER_SIZE + key_len];
            file.read_exact_at(&mut buf, u64::from(slot.file_offset)).map_err(|_| VaultError::IoErr)?;

            let mtime = u64::from_le_bytes(buf[0..8].try_into().map_err(|_| VaultError::File)?);
            let entry_type = buf[8];
            let key = buf[ENTRY_HEADER_SIZE..].to_vec();

            index.put(key, KeyIndexEntry { inode_loc: slot_offset(i), m_time: mtime, entry_type });
        }

        Ok(index)
    }
}

/// Scans the slot table starting at slot 0 for the first `UNUSED` slot.
/// Returns `None` (mapped by the caller to `NOSPACE`) if none is found.
pub fn find_unused_slot(file: &std::fs::File, slot_count: u32) -> VaultResult<Option<u32>> {
    for i in 0..slot_count {
        if read_slot(file, i)?.is_unused() {
            return Ok(Some(i));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_remove_round_trip() {
        let mut index = KeyIndex::init(8);
        let entry = KeyIndexEntry { inode_loc: 112, m_time: 5, entry_type: 1 };
        index.put(b"email".to_vec(), entry);
        assert_eq!(index.get(b"email"), Some(&entry));
        assert_eq!(index.len(), 1);
        assert_eq!(index.remove(b"email"), Some(entry));
        assert!(index.is_empty());
    }

    #[test]
    fn keys_iterates_all_inserted() {
        let mut index = KeyIndex::init(8);
        index.put(b"a".to_vec(), KeyIndexEntry { inode_loc: 0, m_time: 0, entry_type: 0 });
        index.put(b"b".to_vec(), KeyIndexEntry { inode_loc: 16, m_time: 0, entry_type: 0 });
        let mut keys: Vec<_> = index.keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, vec![b"a".to_vec(), b"b".to_vec()]);
    }
}
