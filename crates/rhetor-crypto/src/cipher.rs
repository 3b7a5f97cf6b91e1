//! ChaCha20-Poly1305 authenticated encryption
//!
//! Every sealed payload carries its own random nonce, so callers only
//! need to keep the key (or the passphrase it was derived from).

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};
use ring::rand::{SecureRandom, SystemRandom};
use thiserror::Error;
use zeroize::Zeroizing;

/// 256-bit key (32 bytes)
pub const KEY_SIZE: usize = 32;
/// 96-bit nonce (12 bytes)
pub const NONCE_SIZE: usize = 12;
/// Poly1305 tag (16 bytes)
pub const TAG_SIZE: usize = 16;

#[derive(Error, Debug)]
pub enum CipherError {
    #[error("Encryption failed")]
    EncryptionFailed,

    #[error("Decryption failed - data may be corrupted or tampered")]
    DecryptionFailed,

    #[error("Invalid key size: expected {KEY_SIZE}, got {0}")]
    InvalidKeySize(usize),

    #[error("System randomness unavailable")]
    Randomness,
}

/// Fill a buffer from the system CSPRNG
pub fn fill_random(buf: &mut [u8]) -> Result<(), CipherError> {
    SystemRandom::new()
        .fill(buf)
        .map_err(|_| CipherError::Randomness)
}

/// Generate a cryptographically secure random nonce
pub fn generate_nonce() -> Result<[u8; NONCE_SIZE], CipherError> {
    let mut nonce = [0u8; NONCE_SIZE];
    fill_random(&mut nonce)?;
    Ok(nonce)
}

/// Encrypt plaintext, authenticating `aad` alongside it.
///
/// Returns: nonce || ciphertext || tag
pub fn encrypt(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
    if key.len() != KEY_SIZE {
        return Err(CipherError::InvalidKeySize(key.len()));
    }

    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|_| CipherError::InvalidKeySize(key.len()))?;

    let nonce_bytes = generate_nonce()?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, Payload { msg: plaintext, aad })
        .map_err(|_| CipherError::EncryptionFailed)?;

    let mut result = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    result.extend_from_slice(&nonce_bytes);
    result.extend_from_slice(&ciphertext);

    Ok(result)
}

/// Decrypt data produced by [`encrypt`] with the same key and `aad`.
///
/// Expects: nonce || ciphertext || tag
pub fn decrypt(key: &[u8], sealed: &[u8], aad: &[u8]) -> Result<Zeroizing<Vec<u8>>, CipherError> {
    if key.len() != KEY_SIZE {
        return Err(CipherError::InvalidKeySize(key.len()));
    }

    if sealed.len() < NONCE_SIZE + TAG_SIZE {
        return Err(CipherError::DecryptionFailed);
    }

    let cipher = ChaCha20Poly1305::new_from_slice(key)
        .map_err(|_| CipherError::InvalidKeySize(key.len()))?;

    let (nonce_bytes, encrypted) = sealed.split_at(NONCE_SIZE);
    let nonce = Nonce::from_slice(nonce_bytes);

    let plaintext = cipher
        .decrypt(nonce, Payload { msg: encrypted, aad })
        .map_err(|_| CipherError::DecryptionFailed)?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn random_key() -> [u8; KEY_SIZE] {
        let mut key = [0u8; KEY_SIZE];
        fill_random(&mut key).unwrap();
        key
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = random_key();
        let plaintext = br#"[{"id":"kennedy-1961","label":"Inaugural address"}]"#;

        let sealed = encrypt(&key, plaintext, b"header").unwrap();
        assert_ne!(&sealed[NONCE_SIZE..NONCE_SIZE + plaintext.len()], plaintext);

        let decrypted = decrypt(&key, &sealed, b"header").unwrap();
        assert_eq!(decrypted.as_slice(), plaintext);
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = random_key();
        let mut sealed = encrypt(&key, b"secret data", b"").unwrap();

        if let Some(byte) = sealed.last_mut() {
            *byte ^= 0xFF;
        }

        assert!(decrypt(&key, &sealed, b"").is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = encrypt(&random_key(), b"secret data", b"").unwrap();
        assert!(decrypt(&random_key(), &sealed, b"").is_err());
    }

    #[test]
    fn test_mismatched_aad_fails() {
        let key = random_key();
        let sealed = encrypt(&key, b"secret data", b"v1").unwrap();
        assert!(decrypt(&key, &sealed, b"v2").is_err());
    }

    #[test]
    fn test_short_input_rejected() {
        let key = random_key();
        assert!(matches!(
            decrypt(&key, &[0u8; 10], b""),
            Err(CipherError::DecryptionFailed)
        ));
        assert!(matches!(
            encrypt(&key[..16], b"x", b""),
            Err(CipherError::InvalidKeySize(16))
        ));
    }
}
