//! Tile metadata store.
//!
//! Fetches and caches the manifest and atlas documents of each tile. Tile
//! definitions are static for the lifetime of the process, so successful
//! results are kept until [`MetadataStore::clear`]; failures are never cached.
//!
//! # Example
//!
//! ```ignore
//! use tile_atlas::io::{HttpFetcher, TileUrls};
//! use tile_atlas::tile::{MetadataStore, TileId};
//!
//! let urls = TileUrls::new("https://cdn.example.com/assets/")?;
//! let store = MetadataStore::new(HttpFetcher::new(), urls);
//!
//! // Both documents are fetched once, concurrently
//! if let Some(meta) = store.get(TileId::ground(245)).await {
//!     println!("{} frames", meta.frame_count);
//! }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{FetchError, LoadError};
use crate::io::{fetch_json, with_timeout, RequestLedger, TileFetcher, TileUrls};

use super::metadata::{AtlasLayout, TileManifest, TileMetadata};
use super::TileId;

type MetadataResult = Result<Arc<TileMetadata>, LoadError>;

/// Per-tile metadata cache with request coalescing.
pub struct MetadataStore<F> {
    fetcher: F,
    urls: TileUrls,

    /// Loaded metadata, never evicted
    entries: RwLock<HashMap<TileId, Arc<TileMetadata>>>,

    /// In-flight document fetches
    in_flight: RequestLedger<TileId, MetadataResult>,

    timeout: Option<Duration>,
}

impl<F: TileFetcher> MetadataStore<F> {
    pub fn new(fetcher: F, urls: TileUrls) -> Self {
        Self {
            fetcher,
            urls,
            entries: RwLock::new(HashMap::new()),
            in_flight: RequestLedger::new(),
            timeout: None,
        }
    }

    /// Bound each manifest/atlas fetch pair by `timeout`.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Get metadata for a tile, fetching it on first use.
    ///
    /// Failures are logged and reported as `None`.
    pub async fn get(&self, tile: TileId) -> Option<Arc<TileMetadata>> {
        match self.load(tile).await {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                warn!(%tile, error = %e, "tile metadata unavailable");
                None
            }
        }
    }

    /// Get metadata that is already loaded, without fetching.
    pub fn get_cached(&self, tile: TileId) -> Option<Arc<TileMetadata>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tile)
            .cloned()
    }

    /// Get metadata for a tile, fetching it on first use.
    pub async fn load(&self, tile: TileId) -> MetadataResult {
        if let Some(metadata) = self.get_cached(tile) {
            return Ok(metadata);
        }

        self.in_flight
            .dedupe(tile, || async {
                // A previous leader may have finished since the fast path.
                if let Some(metadata) = self.get_cached(tile) {
                    return Ok(metadata);
                }

                let metadata = Arc::new(self.fetch_metadata(tile).await?);
                self.entries
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(tile, metadata.clone());
                debug!(%tile, frames = metadata.frame_count, "tile metadata loaded");
                Ok(metadata)
            })
            .await
    }

    async fn fetch_metadata(&self, tile: TileId) -> Result<TileMetadata, LoadError> {
        let manifest_url = self.urls.manifest_url(tile);
        let atlas_url = self.urls.atlas_url(tile);

        let (manifest, atlas) = with_timeout(self.timeout, "metadata fetch", async {
            tokio::try_join!(
                fetch_json::<TileManifest, _>(&self.fetcher, &manifest_url),
                fetch_json::<AtlasLayout, _>(&self.fetcher, &atlas_url),
            )
        })
        .await?;

        TileMetadata::from_documents(tile, manifest, atlas, |file| {
            self.urls.source_url(tile, file)
        })
        .map_err(|message| {
            LoadError::Fetch(FetchError::Parse {
                url: manifest_url,
                message,
            })
        })
    }

    /// Number of tiles with loaded metadata.
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of metadata fetches currently in flight.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    /// Drop every loaded entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

// =============================================================================
// Tests
// =============================================================================
