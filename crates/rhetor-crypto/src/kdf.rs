//! Passphrase key derivation (PBKDF2-HMAC-SHA256)

use std::num::NonZeroU32;

use ring::pbkdf2;
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use crate::cipher::{self, KEY_SIZE};
use crate::CryptoError;

/// Salt length in bytes
pub const SALT_SIZE: usize = 16;
/// Default PBKDF2 iteration count for new blobs
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Generate a fresh random salt
pub fn generate_salt() -> Result<[u8; SALT_SIZE], CryptoError> {
    let mut salt = [0u8; SALT_SIZE];
    cipher::fill_random(&mut salt)?;
    Ok(salt)
}

/// Derive a 256-bit key from a passphrase.
///
/// The key is wrapped in `Zeroizing` and scrubbed on drop.
pub fn derive_key(
    passphrase: &SecretString,
    salt: &[u8],
    iterations: u32,
) -> Result<Zeroizing<[u8; KEY_SIZE]>, CryptoError> {
    let rounds = NonZeroU32::new(iterations).ok_or(CryptoError::InvalidIterations(iterations))?;
    if passphrase.expose_secret().is_empty() {
        return Err(CryptoError::EmptyPassphrase);
    }

    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        rounds,
        salt,
        passphrase.expose_secret().as_bytes(),
        &mut key[..],
    );
    Ok(key)
}
