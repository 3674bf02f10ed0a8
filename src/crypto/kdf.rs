//! Argon2id password-based key derivation.
//!
//! Used for both the password-wrapping key (header salt) and the recovery
//! protocol's per-answer keys (arbitrary salts supplied by the caller).

use argon2::Algorithm::Argon2id;
use argon2::Version::V0x13;
use argon2::{Argon2, Params};

use crate::config::{ARGON2_MEM_KIB, ARGON2_PARALLELISM, ARGON2_TIME_COST, MASTER_KEY_SIZE};
use crate::error::{VaultError, VaultResult};

/// Derives a 32-byte key from `password` and `salt` at the vault's
/// "moderate" Argon2id cost profile. Deterministic given identical inputs.
pub fn derive(password: &[u8], salt: &[u8]) -> VaultResult<[u8; MASTER_KEY_SIZE]> {
    let params = Params::new(ARGON2_MEM_KIB, ARGON2_TIME_COST, ARGON2_PARALLELISM, Some(MASTER_KEY_SIZE))
        .map_err(|_| VaultError::CryptoErr)?;
    let argon2 = Argon2::new(Argon2id, V0x13, params);
    let mut key = [0u8; MASTER_KEY_SIZE];
    argon2.hash_password_into(password, salt, &mut key).map_err(|_| VaultError::CryptoErr)?;
    Ok(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_given_same_inputs() {
        let salt = [1u8; 16];
        assert_eq!(derive(b"hunter2", &salt).unwrap(), derive(b"hunter2", &salt).unwrap());
    }

    #[test]
    fn differs_across_salts() {
        let a = derive(b"hunter2", &[1u8; 16]).unwrap();
        let b = derive(b"hunter2", &[2u8; 16]).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn differs_across_passwords() {
        let salt = [1u8; 16];
        let a = derive(b"hunter2", &salt).unwrap();
        let b = derive(b"s3cret", &salt).unwrap();
        assert_ne!(a, b);
    }
}
