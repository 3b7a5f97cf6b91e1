//! Rhetor Sources - where analysis texts come from
//!
//! Source descriptors live in a passphrase-sealed store; their full texts
//! are fetched once and kept in a file-backed cache.

pub mod cache;
pub mod fetch;
pub mod source;
pub mod store;

pub use cache::{CacheError, TextCache};
pub use fetch::SourceFetcher;
pub use source::{SourceDescriptor, SourceKind};
pub use store::SourceStore;

/// Errors from source configuration and fetching
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Missing/corrupt blob or bad passphrase
    #[error("Configuration load error: {0}")]
    ConfigurationLoad(String),

    #[error("Duplicate source id: {0}")]
    DuplicateId(String),

    #[error("Invalid source id: {0:?}")]
    InvalidId(String),

    #[error("Source not found: {0}")]
    NotFound(String),

    #[error("Fetch failed: {0}")]
    Fetch(String),

    #[error("Extract marker not found: {0:?}")]
    MarkerNotFound(String),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] rhetor_crypto::CryptoError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SourceError>;
