//! File-backed text cache
//!
//! One `<key>.txt` per source under the cache directory. The key keeps
//! `[A-Za-z0-9_-]` as is and writes every other byte of the id as `%XX`,
//! so distinct ids never share a file and no id can escape the directory.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Invalid cache key: {0:?}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read-through cache of full source texts
#[derive(Debug, Clone)]
pub struct TextCache {
    dir: PathBuf,
}

/// Percent-encode everything outside `[A-Za-z0-9_-]`
fn file_key(id: &str) -> String {
    let mut key = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            key.push(b as char);
        } else {
            let _ = write!(key, "%{:02X}", b);
        }
    }
    key
}

impl TextCache {
    /// Open or create the cache directory
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, CacheError> {
        if id.trim().is_empty() {
            return Err(CacheError::InvalidKey(id.to_string()));
        }
        Ok(self.dir.join(format!("{}.txt", file_key(id))))
    }

    pub async fn get(&self, id: &str) -> Result<Option<String>, CacheError> {
        let path = self.path_for(id)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => {
                tracing::debug!(id, path = %path.display(), "cache hit");
                Ok(Some(text))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn put(&self, id: &str, text: &str) -> Result<(), CacheError> {
        let path = self.path_for(id)?;
        tokio::fs::write(&path, text).await?;
        tracing::debug!(id, bytes = text.len(), "cached text");
        Ok(())
    }

    pub async fn contains(&self, id: &str) -> bool {
        match self.path_for(id) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Returns whether an entry was removed
    pub async fn remove(&self, id: &str) -> Result<bool, CacheError> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Remove every cached text, returning how many were deleted
    pub async fn clear(&self) -> Result<usize, CacheError> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "txt").unwrap_or(false) {
                tokio::fs::remove_file(&path).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
