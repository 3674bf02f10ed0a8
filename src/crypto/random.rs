//! Cryptographically secure random byte generation.

use rand::rand_core::{OsRng, TryRngCore};

use crate::error::{VaultError, VaultResult};

/// Fills a fixed-size array with bytes from the OS CSPRNG.
pub fn fill<const N: usize>() -> VaultResult<[u8; N]> {
    let mut bytes = [0u8; N];
    OsRng.try_fill_bytes(&mut bytes).map_err(|_| VaultError::CryptoErr)?;
    Ok(bytes)
}

/// Returns `n` cryptographically secure random bytes.
pub fn random(n: usize) -> VaultResult<Vec<u8>> {
    let mut bytes = vec![0u8; n];
    OsRng.try_fill_bytes(&mut bytes).map_err(|_| VaultError::CryptoErr)?;
    Ok(bytes)
}
