//! Resolving a source descriptor to its full text

use crate::cache::TextCache;
use crate::source::{predefined_text, SourceDescriptor, SourceKind};
use crate::store::SourceStore;
use crate::{Result, SourceError};

/// Fetches source texts through the [`TextCache`]
pub struct SourceFetcher {
    cache: TextCache,
    http: reqwest::Client,
}

impl SourceFetcher {
    pub fn new(cache: TextCache, http: reqwest::Client) -> Self {
        Self { cache, http }
    }

    pub fn cache(&self) -> &TextCache {
        &self.cache
    }

    /// Full text of source `id`.
    ///
    /// Order: text pinned on the descriptor, then the cache directory, then
    /// the origin (which populates the cache).
    pub async fn fetch(&self, store: &SourceStore, id: &str) -> Result<String> {
        let descriptor = store
            .get(id)
            .ok_or_else(|| SourceError::NotFound(id.to_string()))?;

        if let Some(text) = descriptor.cached_text() {
            return Ok(text.to_string());
        }
        if let Some(text) = self.cache.get(id).await? {
            return Ok(text);
        }

        let text = match descriptor.kind {
            SourceKind::Extract => {
                let parent = store
                    .get(&descriptor.location)
                    .ok_or_else(|| SourceError::NotFound(descriptor.location.clone()))?;
                if parent.kind == SourceKind::Extract {
                    return Err(SourceError::Fetch(format!(
                        "extract {} points at another extract ({})",
                        descriptor.id, parent.id
                    )));
                }
                let full = match parent.cached_text() {
                    Some(text) => text.to_string(),
                    None => match self.cache.get(&parent.id).await? {
                        Some(text) => text,
                        None => {
                            let text = self.fetch_origin(parent).await?;
                            self.cache.put(&parent.id, &text).await?;
                            text
                        }
                    },
                };
                extract_between(
                    &full,
                    descriptor.start_marker.as_deref(),
                    descriptor.end_marker.as_deref(),
                )?
            }
            _ => self.fetch_origin(descriptor).await?,
        };

        self.cache.put(id, &text).await?;
        tracing::info!(id, kind = %descriptor.kind, bytes = text.len(), "fetched source text");
        Ok(text)
    }

    /// Fetch and pin the text onto the descriptor (write-once)
    pub async fn populate(&self, store: &mut SourceStore, id: &str) -> Result<String> {
        let text = self.fetch(store, id).await?;
        if let Some(d) = store.get_mut(id) {
            d.set_cached_text(text.clone());
        }
        Ok(text)
    }

    /// Drop every cached copy of `id` and fetch it again from its origin
    pub async fn refresh(&self, store: &mut SourceStore, id: &str) -> Result<String> {
        self.cache.remove(id).await?;
        let descriptor = store
            .get_mut(id)
            .ok_or_else(|| SourceError::NotFound(id.to_string()))?;
        descriptor.clear_cached_text();

        let text = self.fetch(store, id).await?;
        if let Some(d) = store.get_mut(id) {
            d.refresh_cached_text(text.clone());
        }
        Ok(text)
    }

    async fn fetch_origin(&self, descriptor: &SourceDescriptor) -> Result<String> {
        match descriptor.kind {
            SourceKind::DirectText => Ok(descriptor.location.clone()),
            SourceKind::Predefined => predefined_text(&descriptor.location)
                .map(str::to_string)
                .ok_or_else(|| {
                    SourceError::Fetch(format!("unknown predefined text {:?}", descriptor.location))
                }),
            SourceKind::File => tokio::fs::read_to_string(&descriptor.location)
                .await
                .map_err(|e| SourceError::Fetch(format!("{}: {}", descriptor.location, e))),
            SourceKind::Url => {
                let resp = self
                    .http
                    .get(&descriptor.location)
                    .send()
                    .await
                    .map_err(|e| SourceError::Fetch(format!("{}: {}", descriptor.location, e)))?;
                if !resp.status().is_success() {
                    return Err(SourceError::Fetch(format!(
                        "{}: HTTP {}",
                        descriptor.location,
                        resp.status()
                    )));
                }
                resp.text()
                    .await
                    .map_err(|e| SourceError::Fetch(format!("{}: {}", descriptor.location, e)))
            }
            SourceKind::Extract => Err(SourceError::Fetch(format!(
                "extract {} has no origin of its own",
                descriptor.id
            ))),
        }
    }
}

/// Slice `text` from the start marker through the end of the end marker.
///
/// A missing start marker means "from the beginning", a missing end marker
/// "to the end". Markers that are given but not found are errors.
pub fn extract_between(text: &str, start: Option<&str>, end: Option<&str>) -> Result<String> {
    let from = match start {
        Some(marker) => text
            .find(marker)
            .ok_or_else(|| SourceError::MarkerNotFound(marker.to_string()))?,
        None => 0,
    };
    let to = match end {
        Some(marker) => {
            let offset = text[from..]
                .find(marker)
                .ok_or_else(|| SourceError::MarkerNotFound(marker.to_string()))?;
            from + offset + marker.len()
        }
        None => text.len(),
    };
    Ok(text[from..to].to_string())
}
