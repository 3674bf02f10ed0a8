//! The 112-byte fixed file header (§3.2).

use crate::config::{HEADER_SIZE, LAST_SERVER_TIME_OFFSET, MAC_SIZE, MASTER_KEY_SIZE, NONCE_SIZE, SALT_SIZE, SLOT_COUNT_OFFSET};
use crate::error::{VaultError, VaultResult};

const ENCRYPTED_MASTER_SIZE: usize = MASTER_KEY_SIZE + MAC_SIZE;

/// In-memory view of the header. Byte offsets match §3.2 exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub salt: [u8; SALT_SIZE],
    /// 32-byte ciphertext + 16-byte MAC wrapping the master key.
    pub encrypted_master: [u8; ENCRYPTED_MASTER_SIZE],
    pub master_nonce: [u8; NONCE_SIZE],
    pub last_server_time: u64,
    pub slot_count: u32,
}

impl Header {
    /// Packs the header into its on-disk 112-byte representation.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0] = self.version;
        // bytes 1..8 stay zero (reserved)
        buf[8..24].copy_from_slice(&self.salt);
        buf[24..24 + ENCRYPTED_MASTER_SIZE].copy_from_slice(&self.encrypted_master);
        buf[72..72 + NONCE_SIZE].copy_from_slice(&self.master_nonce);
        buf[LAST_SERVER_TIME_OFFSET..LAST_SERVER_TIME_OFFSET + 8].copy_from_slice(&self.last_server_time.to_le_bytes());
        // bytes 104..108 stay zero (reserved)
        buf[SLOT_COUNT_OFFSET..SLOT_COUNT_OFFSET + 4].copy_from_slice(&self.slot_count.to_le_bytes());
        buf
    }

    /// Unpacks a 112-byte buffer into a structured header view.
    pub fn from_bytes(buf: &[u8; HEADER_SIZE]) -> VaultResult<Self> {
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&buf[8..24]);

        let mut encrypted_master = [0u8; ENCRYPTED_MASTER_SIZE];
        encrypted_master.copy_from_slice(&buf[24..24 + ENCRYPTED_MASTER_SIZE]);

        let mut master_nonce = [0u8; NONCE_SIZE];
        master_nonce.copy_from_slice(&buf[72..72 + NONCE_SIZE]);

        let last_server_time = u64::from_le_bytes(
            buf[LAST_SERVER_TIME_OFFSET..LAST_SERVER_TIME_OFFSET + 8].try_into().map_err(|_| VaultError::File)?,
        );
        let slot_count =
            u32::from_le_bytes(buf[SLOT_COUNT_OFFSET..SLOT_COUNT_OFFSET + 4].try_into().map_err(|_| VaultError::File)?);

        Ok(Self { version: buf[0], salt, encrypted_master, master_nonce, last_server_time, slot_count })
    }
}
