//! The frozen numeric error contract (wire-stable across bindings).

use thiserror::Error;

/// Every way a public vault operation can fail.
///
/// Variant order is meaningless; the wire-stable value is [`VaultError::code`],
/// not the discriminant. Codes must never be renumbered once shipped.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Error)]
pub enum VaultError {
    /// Secure-memory transition failed.
    #[error("secure memory transition failed (code 1)")]
    MemErr,

    /// Null or over-long argument.
    #[error("invalid or over-long argument (code 2)")]
    ParamErr,

    /// File read/write failed.
    #[error("file I/O failed (code 3)")]
    IoErr,

    /// KDF/encrypt/decrypt/hash failed, or per-entry MAC mismatch.
    #[error("cryptographic operation failed (code 4)")]
    CryptoErr,

    /// Vault already open on this handle.
    #[error("vault already open (code 5)")]
    VOpen,

    /// No vault open on this handle.
    #[error("no vault open (code 6)")]
    VClose,

    /// `open`/`lseek`/`flock` failed for a reason other than the ones above.
    #[error("system call failed (code 7)")]
    Syscall,

    /// File already exists (create) or is absent (open).
    #[error("vault file already exists, or does not exist (code 8)")]
    Exist,

    /// Permission denied.
    #[error("permission denied (code 9)")]
    Access,

    /// Key already present (add), or absent (open/delete/update).
    #[error("key already exists, or does not exist (code 10)")]
    KeyExist,

    /// File MAC mismatch, or imported-entry MAC mismatch.
    #[error("file or entry authentication failed (code 11)")]
    File,

    /// Internal: slot table full. Never surfaced to callers; handled by a
    /// compact-and-retry inside `add_key`/`add_encrypted_value`.
    #[error("slot table full (code 12)")]
    NoSpace,

    /// Password-derived key fails to authenticate the wrapped master key.
    #[error("incorrect password (code 13)")]
    WrongPass,
}

impl VaultError {
    /// The frozen numeric code for this error, per the external wire contract.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::MemErr => 1,
            Self::ParamErr => 2,
            Self::IoErr => 3,
            Self::CryptoErr => 4,
            Self::VOpen => 5,
            Self::VClose => 6,
            Self::Syscall => 7,
            Self::Exist => 8,
            Self::Access => 9,
            Self::KeyExist => 10,
            Self::File => 11,
            Self::NoSpace => 12,
            Self::WrongPass => 13,
        }
    }
}

impl From<std::io::Error> for VaultError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::AlreadyExists => Self::Exist,
            ErrorKind::NotFound => Self::Exist,
            ErrorKind::PermissionDenied => Self::Access,
            _ => Self::IoErr,
        }
    }
}

/// Result alias used throughout the engine.
pub type VaultResult<T> = Result<T, VaultError>;
