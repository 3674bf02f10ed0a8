//! Variable-length entry framing and whole-file positioned I/O (§4.3).
//!
//! This module only assembles and slices byte layouts; it never derives or
//! verifies a MAC itself — that is the engine's job, composing the Crypto
//! Facade with the byte ranges this module exposes.

use std::os::unix::fs::FileExt;

use crate::config::{ENTRY_HEADER_SIZE, HASH_SIZE, MAC_SIZE, NONCE_SIZE, REHASH_CHUNK_SIZE};
use crate::crypto::hash::IncrementalHash;
use crate::error::{VaultError, VaultResult};

/// Total on-disk size of an entry given its key and value lengths.
#[must_use]
pub fn entry_len(key_len: usize, val_len: usize) -> usize {
    ENTRY_HEADER_SIZE + key_len + val_len + MAC_SIZE + NONCE_SIZE + HASH_SIZE
}

/// Assembles the authenticated portion of an entry (everything except the
/// trailing 32-byte `entry_mac`): `mtime‖type‖key‖ciphertext‖nonce`.
#[must_use]
pub fn frame(mtime: u64, entry_type: u8, key: &[u8], ciphertext: &[u8], nonce: &[u8; NONCE_SIZE]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ENTRY_HEADER_SIZE + key.len() + ciphertext.len() + NONCE_SIZE);
    buf.extend_from_slice(&mtime.to_le_bytes());
    buf.push(entry_type);
    buf.extend_from_slice(key);
    buf.extend_from_slice(ciphertext);
    buf.extend_from_slice(nonce);
    buf
}

/// Structured view over a fully-assembled entry's raw bytes, sliced by the
/// lengths recorded in its slot descriptor.
pub struct EntryView<'a> {
    raw: &'a [u8],
    key_len: usize,
    val_len: usize,
}

impl<'a> EntryView<'a> {
    /// Wraps `raw`, validating that its length matches `key_len`/`val_len`.
    pub fn parse(raw: &'a [u8], key_len: usize, val_len: usize) -> VaultResult<Self> {
        if raw.len() != entry_len(key_len, val_len) {
            return Err(VaultError::File);
        }
        Ok(Self { raw, key_len, val_len })
    }

    #[must_use]
    pub fn mtime(&self) -> u64 {
        u64::from_le_bytes(self.raw[0..8].try_into().expect("checked length"))
    }

    #[must_use]
    pub fn entry_type(&self) -> u8 {
        self.raw[8]
    }

    #[must_use]
    pub fn key(&self) -> &'a [u8] {
        &self.raw[ENTRY_HEADER_SIZE..ENTRY_HEADER_SIZE + self.key_len]
    }

    /// Ciphertext plus its 16-byte secret-box MAC.
    #[must_use]
    pub fn ciphertext(&self) -> &'a [u8] {
        let start = ENTRY_HEADER_SIZE + self.key_len;
        &self.raw[start..start + self.val_len + MAC_SIZE]
    }

    #[must_use]
    pub fn nonce(&self) -> &'a [u8] {
        let start = ENTRY_HEADER_SIZE + self.key_len + self.val_len + MAC_SIZE;
        &self.raw[start..start + NONCE_SIZE]
    }

    #[must_use]
    pub fn entry_mac(&self) -> &'a [u8] {
        &self.raw[self.raw.len() - HASH_SIZE..]
    }

    /// Every byte except the trailing `entry_mac`, i.e. what the mac is
    /// computed over.
    #[must_use]
    pub fn bytes_sans_mac(&self) -> &'a [u8] {
        &self.raw[..self.raw.len() - HASH_SIZE]
    }
}

/// Reads `total_len` bytes starting at `offset`.
pub fn read_entry(file: &std::fs::File, offset: u64, total_len: usize) -> VaultResult<Vec<u8>> {
    let mut buf = vec![0u8; total_len];
    file.read_exact_at(&mut buf, offset).map_err(|_| VaultError::IoErr)?;
    Ok(buf)
}

/// Writes `bytes` at `offset`, extending the file if necessary.
pub fn write_entry(file: &std::fs::File, offset: u64, bytes: &[u8]) -> VaultResult<()> {
    file.write_all_at(bytes, offset).map_err(|_| VaultError::IoErr)
}

/// Current file length in bytes.
pub fn file_len(file: &std::fs::File) -> VaultResult<u64> {
    file.metadata().map(|meta| meta.len()).map_err(|_| VaultError::IoErr)
}

/// Truncates (or extends) the file to exactly `len` bytes.
pub fn truncate(file: &std::fs::File, len: u64) -> VaultResult<()> {
    file.set_len(len).map_err(|_| VaultError::IoErr)
}

/// Recomputes the whole-file keyed hash, reading in
/// [`REHASH_CHUNK_SIZE`]-byte chunks so the engine never has to load a large
/// vault entirely into memory just to verify or refresh its MAC.
///
/// `omit_trailing` excludes the byte count at EOF that is not part of the
/// hashed region: `0` when no MAC has been written yet, `HASH_SIZE` when a
/// (possibly stale) MAC already trails the file.
pub fn rehash_file(file: &std::fs::File, key: &[u8; crate::config::MASTER_KEY_SIZE], omit_trailing: u64) -> VaultResult<[u8; HASH_SIZE]> {
    let total = file_len(file)?;
    let hashed_len = total.checked_sub(omit_trailing).ok_or(VaultError::File)?;

    let mut hasher = IncrementalHash::init(key);
    let mut offset = 0u64;
    let mut chunk = [0u8; REHASH_CHUNK_SIZE];
    while offset < hashed_len {
        let want = usize::try_from(hashed_len - offset).unwrap_or(REHASH_CHUNK_SIZE).min(REHASH_CHUNK_SIZE);
        file.read_exact_at(&mut chunk[..want], offset).map_err(|_| VaultError::IoErr)?;
        hasher.update(&chunk[..want]);
        offset += want as u64;
    }
    Ok(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempfile;

    #[test]
    fn frame_lengths_match_entry_len() {
        let nonce = [1u8; NONCE_SIZE];
        let bytes = frame(42, 1, b"email", b"ciphertext+mac!!", &nonce);
        assert_eq!(bytes.len(), entry_len(5, b"ciphertext+mac!!".len() - MAC_SIZE));
    }

    #[test]
    fn entry_view_slices_fields_correctly() {
        let nonce = [9u8; NONCE_SIZE];
        let ciphertext_and_mac = vec![7u8; 3 + MAC_SIZE];
        let mut raw = frame(42, 1, b"abc", &ciphertext_and_mac, &nonce);
        raw.extend_from_slice(&[0u8; HASH_SIZE]);

        let view = EntryView::parse(&raw, 3, 3).unwrap();
        assert_eq!(view.mtime(), 42);
        assert_eq!(view.entry_type(), 1);
        assert_eq!(view.key(), b"abc");
        assert_eq!(view.ciphertext(), ciphertext_and_mac.as_slice());
        assert_eq!(view.nonce(), nonce);
        assert_eq!(view.entry_mac(), [0u8; HASH_SIZE]);
    }

    #[test]
    fn rehash_streams_in_chunks_and_matches_one_shot() {
        let file = tempfile().unwrap();
        let data = vec![0x5Au8; REHASH_CHUNK_SIZE * 3 + 17];
        file.write_all_at(&data, 0).unwrap();
        file.set_len(data.len() as u64).unwrap();

        let key = [2u8; crate::config::MASTER_KEY_SIZE];
        let streamed = rehash_file(&file, &key, 0).unwrap();
        let one_shot = crate::crypto::hash::keyed_hash(&data, &key);
        assert_eq!(streamed, one_shot);
    }

    #[test]
    fn rehash_omits_trailing_bytes() {
        let file = tempfile().unwrap();
        let mut data = vec![0xAAu8; 100];
        data.extend_from_slice(&[0u8; HASH_SIZE]);
        file.write_all_at(&data, 0).unwrap();
        file.set_len(data.len() as u64).unwrap();

        let key = [2u8; crate::config::MASTER_KEY_SIZE];
        let digest = rehash_file(&file, &key, HASH_SIZE as u64).unwrap();
        assert_eq!(digest, crate::crypto::hash::keyed_hash(&data[..100], &key));
    }
}
