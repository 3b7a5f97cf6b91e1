//! Source configuration store
//!
//! Descriptors are persisted as one passphrase-sealed JSON array. A missing
//! or unreadable blob is never fatal for callers that go through
//! [`SourceStore::load_or_default`]; they get the built-in demo set instead.

use std::collections::BTreeMap;
use std::path::Path;

use rhetor_crypto::SecretString;

use crate::source::{default_sources, SourceDescriptor};
use crate::{Result, SourceError};

/// Named text sources, unique by id, iterated in id order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceStore {
    sources: BTreeMap<String, SourceDescriptor>,
}

impl SourceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The in-memory fallback set
    pub fn defaults() -> Self {
        // Default ids are distinct
        let mut store = Self::new();
        for source in default_sources() {
            store.sources.insert(source.id.clone(), source);
        }
        store
    }

    /// Build a store, rejecting duplicate ids
    pub fn from_descriptors(descriptors: Vec<SourceDescriptor>) -> Result<Self> {
        let mut store = Self::new();
        for d in descriptors {
            store.insert(d)?;
        }
        Ok(store)
    }

    /// Decrypt a sealed blob. Any failure (bad passphrase, tampering,
    /// invalid JSON, duplicate ids) is a configuration load error.
    pub fn from_sealed(blob: &[u8], passphrase: &SecretString) -> Result<Self> {
        let plaintext = rhetor_crypto::open(passphrase, blob)
            .map_err(|e| SourceError::ConfigurationLoad(e.to_string()))?;
        let descriptors: Vec<SourceDescriptor> = serde_json::from_slice(&plaintext)
            .map_err(|e| SourceError::ConfigurationLoad(format!("invalid source list: {}", e)))?;
        Self::from_descriptors(descriptors)
            .map_err(|e| SourceError::ConfigurationLoad(e.to_string()))
    }

    /// Encrypt the store into a sealed blob
    pub fn to_sealed(&self, passphrase: &SecretString) -> Result<Vec<u8>> {
        let plaintext = serde_json::to_vec(&self.descriptors())?;
        Ok(rhetor_crypto::seal(passphrase, &plaintext)?)
    }

    /// Strict load from disk
    pub fn open(path: &Path, passphrase: &SecretString) -> Result<Self> {
        let blob = std::fs::read(path).map_err(|e| {
            SourceError::ConfigurationLoad(format!("cannot read {}: {}", path.display(), e))
        })?;
        let store = Self::from_sealed(&blob, passphrase)?;
        tracing::info!(path = %path.display(), sources = store.len(), "loaded source configuration");
        Ok(store)
    }

    /// Load from disk, falling back to [`defaults`](Self::defaults) on any error
    pub fn load_or_default(path: &Path, passphrase: Option<&SecretString>) -> Self {
        let Some(passphrase) = passphrase else {
            tracing::info!("no passphrase supplied, using default sources");
            return Self::defaults();
        };
        if !path.exists() {
            tracing::info!(path = %path.display(), "no source configuration, using defaults");
            return Self::defaults();
        }
        match Self::open(path, passphrase) {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "falling back to default sources");
                Self::defaults()
            }
        }
    }

    /// Seal and write to disk, creating parent directories
    pub fn save(&self, path: &Path, passphrase: &SecretString) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let blob = self.to_sealed(passphrase)?;
        std::fs::write(path, blob)?;
        tracing::info!(path = %path.display(), sources = self.len(), "saved source configuration");
        Ok(())
    }

    pub fn insert(&mut self, descriptor: SourceDescriptor) -> Result<()> {
        if descriptor.id.trim().is_empty() {
            return Err(SourceError::InvalidId(descriptor.id));
        }
        if self.sources.contains_key(&descriptor.id) {
            return Err(SourceError::DuplicateId(descriptor.id));
        }
        self.sources.insert(descriptor.id.clone(), descriptor);
        Ok(())
    }

    pub fn remove(&mut self, id: &str) -> Result<SourceDescriptor> {
        self.sources
            .remove(id)
            .ok_or_else(|| SourceError::NotFound(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Option<&SourceDescriptor> {
        self.sources.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut SourceDescriptor> {
        self.sources.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SourceDescriptor> {
        self.sources.values()
    }

    pub fn descriptors(&self) -> Vec<SourceDescriptor> {
        self.sources.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
