//! Rhetor Crypto - encryption at rest for small configuration blobs
//!
//! This crate provides:
//! - ChaCha20-Poly1305 authenticated encryption
//! - PBKDF2 passphrase key derivation
//! - A self-describing sealed blob format

pub mod cipher;
pub mod kdf;
pub mod sealed;

pub use cipher::CipherError;
pub use sealed::{open, seal, seal_with_iterations};

/// Re-exported so callers can build passphrases without a direct dependency
pub use secrecy::{ExposeSecret, SecretString};

/// Errors that can occur while sealing or opening a blob
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    #[error("Wrong passphrase or corrupted data")]
    Unseal,

    #[error("Malformed sealed blob: {0}")]
    Malformed(String),

    #[error("Unsupported blob version: {0}")]
    UnsupportedVersion(u8),

    #[error("Invalid iteration count: {0}")]
    InvalidIterations(u32),

    #[error("Passphrase must not be empty")]
    EmptyPassphrase,
}

pub type Result<T> = std::result::Result<T, CryptoError>;
