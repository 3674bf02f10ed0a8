//! Bit-exact on-disk constants and KDF cost parameters.
//!
//! Every value here is part of the file format or the frozen error/wire
//! contract; changing one changes what files this crate can read.

/// Current on-disk format version. Bump only alongside a migration path.
pub const VERSION: u8 = 1;

/// Argon2id salt length, stored at header offset 8.
pub const SALT_SIZE: usize = 16;

/// Secret-box (master) key length.
pub const MASTER_KEY_SIZE: usize = 32;

/// Secret-box authentication tag length.
pub const MAC_SIZE: usize = 16;

/// Secret-box nonce length (XChaCha20Poly1305's extended nonce).
pub const NONCE_SIZE: usize = 24;

/// Keyed generic hash digest length, used for both entry and file MACs.
pub const HASH_SIZE: usize = 32;

/// Fixed header size in bytes.
pub const HEADER_SIZE: usize = 112;

/// Slot descriptor size: four little-endian uint32s.
pub const LOC_SIZE: usize = 16;

/// Entry header size: 8-byte mtime + 1-byte type, preceding the key bytes.
pub const ENTRY_HEADER_SIZE: usize = 9;

/// Initial slot table capacity. Must be a power of two; compaction doubles it.
pub const INITIAL_SIZE: u32 = 8;

/// Max key length including its terminator.
pub const BOX_KEY_SIZE: usize = 128;

/// Max plaintext value length. Generous for passwords, TOTP seeds, and short
/// notes, while keeping a single entry well under common filesystem block
/// sizes.
pub const DATA_SIZE: usize = 1024;

/// Max byte length of the `directory` argument (matches Linux `PATH_MAX`).
pub const MAX_PATH_LEN: usize = 4096;

/// Max byte length of `username`.
pub const MAX_USER_SIZE: usize = 64;

/// Max byte length of `password` and recovery answers.
pub const MAX_PASS_SIZE: usize = 256;

/// Slot state: never written.
pub const SLOT_UNUSED: u32 = 0;

/// Slot state: holds a live entry.
pub const SLOT_ACTIVE: u32 = 0x0001_0001;

/// Slot state: entry reclaimed, awaiting compaction.
pub const SLOT_DELETED: u32 = 1;

/// Header byte offset of the trailing slot count field.
pub const SLOT_COUNT_OFFSET: usize = 108;

/// Header byte offset of the last-server-sync timestamp.
pub const LAST_SERVER_TIME_OFFSET: usize = 96;

/// Chunk size `rehash_file` reads in while streaming the whole-file MAC.
pub const REHASH_CHUNK_SIZE: usize = 1024;

/// Argon2id memory cost, in KiB. The "moderate" profile, matching
/// libsodium's `crypto_pwhash_MEMLIMIT_MODERATE`.
pub const ARGON2_MEM_KIB: u32 = 256 * 1024;

/// Argon2id time cost (iterations) at the "moderate" profile.
pub const ARGON2_TIME_COST: u32 = 3;

/// Argon2id parallelism (lanes).
pub const ARGON2_PARALLELISM: u32 = 1;

/// Suffix appended to `username` to form the on-disk filename.
pub const VAULT_FILE_SUFFIX: &str = ".vault";
