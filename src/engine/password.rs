//! `change_password` (§4.5.13): rotates the password-wrapping layer without
//! touching the master key or any entry.

use subtle::ConstantTimeEq;
use tracing::instrument;

use super::Vault;
use crate::config::{MASTER_KEY_SIZE, NONCE_SIZE, SALT_SIZE};
use crate::crypto::{kdf, random, secretbox};
use crate::error::{VaultError, VaultResult};
use crate::secret::Secret;

impl Vault {
    /// Verifies `old` still unwraps the master key, then re-wraps it under
    /// `new` with a fresh salt and nonce. Per §9 Open Question 4, the
    /// comparison against the already-decrypted master is constant-time via
    /// `subtle`, not a plain `==`.
    #[instrument(skip(self, old, new))]
    pub fn change_password(&mut self, old: &[u8], new: &[u8]) -> VaultResult<()> {
        let _guard = self.arena.enable_rw()?;
        let header = self.read_header()?;

        let candidate_wrap = Secret::new(kdf::derive(old, &header.salt)?);
        let candidate_bytes = secretbox::decrypt(&header.encrypted_master, &header.master_nonce, candidate_wrap.expose_secret())
            .map_err(|_| VaultError::WrongPass)?;
        let candidate_master: [u8; MASTER_KEY_SIZE] = candidate_bytes.try_into().map_err(|_| VaultError::WrongPass)?;
        let candidate_master = Secret::new(candidate_master);

        if !bool::from(candidate_master.expose_secret().ct_eq(self.master.expose_secret())) {
            return Err(VaultError::WrongPass);
        }

        let new_salt: [u8; SALT_SIZE] = random::fill()?;
        let new_nonce: [u8; NONCE_SIZE] = random::fill()?;
        let new_wrap = kdf::derive(new, &new_salt)?;
        let new_encrypted_master = secretbox::encrypt(self.master.expose_secret(), &new_nonce, &new_wrap)?;

        let mut updated = header;
        updated.salt = new_salt;
        updated.encrypted_master = new_encrypted_master.try_into().map_err(|_| VaultError::CryptoErr)?;
        updated.master_nonce = new_nonce;
        self.write_header(&updated)?;
        self.rehash_and_append(crate::config::HASH_SIZE as u64)?;
        self.sync()?;

        self.salt = new_salt;
        self.derived_key = Secret::new(new_wrap);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn change_password_then_reopen_with_new() {
        let dir = tempdir().unwrap();
        let dir_path = dir.path().to_str().unwrap();
        let mut vault = Vault::create(dir_path, "alice", b"hunter2").unwrap();
        vault.change_password(b"hunter2", b"s3cret").unwrap();
        vault.close();

        Vault::open(dir_path, "alice", b"s3cret").unwrap().close();
        let err = Vault::open(dir_path, "alice", b"hunter2").unwrap_err();
        assert_eq!(err, VaultError::WrongPass);
    }

    #[test]
    fn change_password_with_wrong_old_password_fails() {
        let dir = tempdir().unwrap();
        let mut vault = Vault::create(dir.path().to_str().unwrap(), "alice", b"hunter2").unwrap();
        let err = vault.change_password(b"nope", b"s3cret").unwrap_err();
        assert_eq!(err, VaultError::WrongPass);
    }

    #[test]
    fn change_password_preserves_existing_entries() {
        let dir = tempdir().unwrap();
        let dir_path = dir.path().to_str().unwrap();
        let mut vault = Vault::create(dir_path, "alice", b"hunter2").unwrap();
        vault.add_key(1, b"email", b"a@b", 1000).unwrap();
        vault.change_password(b"hunter2", b"s3cret").unwrap();
        vault.close();

        let mut reopened = Vault::open(dir_path, "alice", b"s3cret").unwrap();
        reopened.open_key(b"email").unwrap();
        let mut buf = [0u8; 64];
        let (len, _) = reopened.place_open_value(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"a@b");
    }
}
