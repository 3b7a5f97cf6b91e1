//! Passphrase-sealed blobs
//!
//! Layout: `RHTR | version | iterations (u32 BE) | salt | nonce | ciphertext | tag`.
//! The whole header is authenticated as associated data, so flipping the
//! iteration count or salt fails the same way a wrong passphrase does.

use secrecy::SecretString;
use zeroize::Zeroizing;

use crate::cipher;
use crate::kdf::{self, SALT_SIZE};
use crate::CryptoError;

const MAGIC: &[u8; 4] = b"RHTR";
const VERSION: u8 = 1;
const HEADER_SIZE: usize = MAGIC.len() + 1 + 4 + SALT_SIZE;

/// Seal `plaintext` under a passphrase using the default iteration count
pub fn seal(passphrase: &SecretString, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    seal_with_iterations(passphrase, plaintext, kdf::DEFAULT_ITERATIONS)
}

/// Seal with an explicit PBKDF2 iteration count
pub fn seal_with_iterations(
    passphrase: &SecretString,
    plaintext: &[u8],
    iterations: u32,
) -> Result<Vec<u8>, CryptoError> {
    let salt = kdf::generate_salt()?;
    let key = kdf::derive_key(passphrase, &salt, iterations)?;

    let mut header = Vec::with_capacity(HEADER_SIZE);
    header.extend_from_slice(MAGIC);
    header.push(VERSION);
    header.extend_from_slice(&iterations.to_be_bytes());
    header.extend_from_slice(&salt);

    let body = cipher::encrypt(&*key, plaintext, &header)?;
    header.extend_from_slice(&body);
    tracing::debug!(bytes = header.len(), iterations, "sealed blob");
    Ok(header)
}

/// Open a blob produced by [`seal`].
///
/// A wrong passphrase and a tampered blob are indistinguishable and both
/// surface as [`CryptoError::Unseal`].
pub fn open(passphrase: &SecretString, blob: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    if blob.len() < HEADER_SIZE {
        return Err(CryptoError::Malformed("blob shorter than header".to_string()));
    }
    let (header, body) = blob.split_at(HEADER_SIZE);
    if &header[..MAGIC.len()] != MAGIC {
        return Err(CryptoError::Malformed("bad magic".to_string()));
    }
    let version = header[MAGIC.len()];
    if version != VERSION {
        return Err(CryptoError::UnsupportedVersion(version));
    }

    let mut iter_bytes = [0u8; 4];
    iter_bytes.copy_from_slice(&header[MAGIC.len() + 1..MAGIC.len() + 5]);
    let iterations = u32::from_be_bytes(iter_bytes);
    let salt = &header[MAGIC.len() + 5..];

    let key = kdf::derive_key(passphrase, salt, iterations)?;
    cipher::decrypt(&*key, body, header).map_err(|_| CryptoError::Unseal)
}
