//! The 16-byte slot descriptor (§3.2) and positioned access to the slot
//! table.

use std::os::unix::fs::FileExt;

use crate::config::{HEADER_SIZE, LOC_SIZE, SLOT_ACTIVE, SLOT_DELETED, SLOT_UNUSED};
use crate::error::{VaultError, VaultResult};

/// One slot table entry: `[state | file_offset | key_len | val_len]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotDescriptor {
    pub state: u32,
    pub file_offset: u32,
    pub key_len: u32,
    pub val_len: u32,
}

impl SlotDescriptor {
    pub const ZERO: Self = Self { state: SLOT_UNUSED, file_offset: 0, key_len: 0, val_len: 0 };

    #[must_use]
    pub fn is_unused(self) -> bool {
        self.state == SLOT_UNUSED
    }

    #[must_use]
    pub fn is_active(self) -> bool {
        self.state == SLOT_ACTIVE
    }

    #[must_use]
    pub fn is_deleted(self) -> bool {
        self.state == SLOT_DELETED
    }

    #[must_use]
    pub fn to_bytes(self) -> [u8; LOC_SIZE] {
        let mut buf = [0u8; LOC_SIZE];
        buf[0..4].copy_from_slice(&self.state.to_le_bytes());
        buf[4..8].copy_from_slice(&self.file_offset.to_le_bytes());
        buf[8..12].copy_from_slice(&self.key_len.to_le_bytes());
        buf[12..16].copy_from_slice(&self.val_len.to_le_bytes());
        buf
    }

    pub fn from_bytes(buf: &[u8; LOC_SIZE]) -> VaultResult<Self> {
        let state = u32::from_le_bytes(buf[0..4].try_into().map_err(|_| VaultError::File)?);
        let file_offset = u32::from_le_bytes(buf[4..8].try_into().map_err(|_| VaultError::File)?);
        let key_len = u32::from_le_bytes(buf[8..12].try_into().map_err(|_| VaultError::File)?);
        let val_len = u32::from_le_bytes(buf[12..16].try_into().map_err(|_| VaultError::File)?);
        Ok(Self { state, file_offset, key_len, val_len })
    }
}

/// Byte offset of slot `index` within the slot table.
#[must_use]
pub fn slot_offset(index: u32) -> u64 {
    HEADER_SIZE as u64 + u64::from(index) * LOC_SIZE as u64
}

/// Reads slot descriptor `index` via positioned I/O.
pub fn read_slot(file: &std::fs::File, index: u32) -> VaultResult<SlotDescriptor> {
    let mut buf = [0u8; LOC_SIZE];
    file.read_exact_at(&mut buf, slot_offset(index)).map_err(|_| VaultError::IoErr)?;
    SlotDescriptor::from_bytes(&buf)
}

/// Writes slot descriptor `index` via positioned I/O.
pub fn write_slot(file: &std::fs::File, index: u32, desc: SlotDescriptor) -> VaultResult<()> {
    file.write_all_at(&desc.to_bytes(), slot_offset(index)).map_err(|_| VaultError::IoErr)
}

/// Reads the slot descriptor located at raw byte offset `offset` in the slot
/// table, as recorded by a [`crate::index::KeyIndexEntry::inode_loc`].
pub fn read_slot_at(file: &std::fs::File, offset: u64) -> VaultResult<SlotDescriptor> {
    let mut buf = [0u8; LOC_SIZE];
    file.read_exact_at(&mut buf, offset).map_err(|_| VaultError::IoErr)?;
    SlotDescriptor::from_bytes(&buf)
}

/// Writes a slot descriptor at raw byte offset `offset` in the slot table.
pub fn write_slot_at(file: &std::fs::File, offset: u64, desc: SlotDescriptor) -> VaultResult<()> {
    file.write_all_at(&desc.to_bytes(), offset).map_err(|_| VaultError::IoErr)
}
