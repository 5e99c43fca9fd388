//! Tile atlas loader - the public face of the cache.
//!
//! Coordinates the three cache layers and owns destruction of every texture
//! handle they register.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       TileAtlasLoader                        │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                     FrameCache (LRU)                   │  │
//! │  │  (tile, zoom_key, frame) → FrameTexture                │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                          │ miss                              │
//! │                          ▼                                   │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                    BaseAtlasStore                      │  │
//! │  │  (tile, zoom_key) → RasterizedBaseAtlas                │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! │                          │ miss                              │
//! │                          ▼                                   │
//! │  ┌────────────────────────────────────────────────────────┐  │
//! │  │                    MetadataStore                       │  │
//! │  │  tile → TileMetadata (manifest + atlas)                │  │
//! │  └────────────────────────────────────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Failures
//!
//! Every public load returns `Option`. Failures are logged and reported as
//! `None`; nothing negative is cached, so the next call retries.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::LoaderConfig;
use crate::error::LoadError;
use crate::io::{TileFetcher, TileUrls};
use crate::raster::{BaseAtlasStore, RasterizedBaseAtlas, Rasterizer, TextureRegistry, ZoomKey};
use crate::tile::{MetadataStore, TileId, TileMetadata};

use super::cache::{frame_pixel_rect, FrameCache, FrameKey, FrameTexture, Inserted};

// =============================================================================
// Cache Statistics
// =============================================================================

/// Snapshot of what the loader currently holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub frame_entries: usize,
    pub frame_bytes: usize,
    pub memory_budget: usize,
    pub base_atlases: usize,
    pub base_atlas_bytes: usize,
    pub retired_frames: usize,
    pub metadata_entries: usize,
    pub pending_loads: usize,
}

// =============================================================================
// Tile Atlas Loader
// =============================================================================

/// Cache lifecycle controller for tile animation frames.
///
/// Owns the metadata store, the base atlas store and the frame cache, and
/// every texture handle they register; callers must never release handles
/// they were given. Cached handles are released by
/// [`clear_zoom`](Self::clear_zoom) and [`clear_all`](Self::clear_all). An
/// evicted frame's handle is released once no caller holds the frame.
pub struct TileAtlasLoader<F, R> {
    metadata: Arc<MetadataStore<F>>,
    bases: BaseAtlasStore<F, R>,
    frames: FrameCache,
    textures: Arc<dyn TextureRegistry>,

    /// Frames evicted from the cache that callers may still hold
    retired: Mutex<Vec<Arc<FrameTexture>>>,
}

impl<F: TileFetcher, R: Rasterizer> TileAtlasLoader<F, R> {
    pub fn new(
        fetcher: F,
        urls: TileUrls,
        rasterizer: R,
        textures: Arc<dyn TextureRegistry>,
        config: LoaderConfig,
    ) -> Self {
        let metadata =
            Arc::new(MetadataStore::new(fetcher, urls).with_timeout(config.load_timeout));
        let bases = BaseAtlasStore::new(
            metadata.clone(),
            rasterizer,
            textures.clone(),
            config.raster_settings(),
        );
        let frames =
            FrameCache::with_capacity_and_entries(config.memory_budget, config.max_entries);

        Self {
            metadata,
            bases,
            frames,
            textures,
            retired: Mutex::new(Vec::new()),
        }
    }

    // =========================================================================
    // Frames
    // =========================================================================

    /// Get one animation frame of `tile` at `zoom`.
    pub async fn load_frame(
        &self,
        tile: TileId,
        frame: u32,
        zoom: f64,
    ) -> Option<Arc<FrameTexture>> {
        match self.try_load_frame(tile, frame, zoom).await {
            Ok(texture) => Some(texture),
            Err(e) => {
                warn!(%tile, frame, zoom, error = %e, "frame unavailable");
                None
            }
        }
    }

    /// Get one animation frame, reporting why it could not be loaded.
    pub async fn try_load_frame(
        &self,
        tile: TileId,
        frame: u32,
        zoom: f64,
    ) -> Result<Arc<FrameTexture>, LoadError> {
        let key = FrameKey::new(tile, ZoomKey::from_zoom(zoom), frame);

        if let Some(cached) = self.frames.get(&key).await {
            debug!(%tile, frame, zoom_key = %key.zoom_key, "frame cache hit");
            return Ok(cached);
        }

        let metadata = self.metadata.load(tile).await?;
        let base = self.bases.load(tile, zoom).await?;

        let descriptor = metadata
            .frame(frame)
            .ok_or(LoadError::MissingFrame { tile, frame })?;
        let rect = frame_pixel_rect(descriptor, metadata.width, base.width(), base.height())
            .ok_or(LoadError::EmptyFrame { tile, frame })?;

        let handle = self.textures.register_texture(&base.image, rect);
        let texture = Arc::new(FrameTexture {
            key,
            base,
            rect,
            handle,
            trim_offset: (descriptor.trim_offset_x, descriptor.trim_offset_y),
        });

        let Inserted { frame: stored, evicted } = self.frames.insert(texture.clone()).await;
        if !Arc::ptr_eq(&stored, &texture) {
            // Lost a race for this key; hand out the cached frame instead.
            self.textures.release_texture(texture.handle);
        }
        self.retire(evicted);

        debug!(%tile, frame, zoom_key = %key.zoom_key, ?rect, "frame loaded");
        Ok(stored)
    }

    /// Load every frame of `tile` at `zoom` concurrently.
    ///
    /// Frames that fail to load are skipped; the rest keep frame order.
    pub async fn load_animation_frames(&self, tile: TileId, zoom: f64) -> Vec<Arc<FrameTexture>> {
        let Some(metadata) = self.get_metadata(tile).await else {
            return Vec::new();
        };

        join_all((0..metadata.frame_count).map(|frame| self.load_frame(tile, frame, zoom)))
            .await
            .into_iter()
            .flatten()
            .collect()
    }

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Get metadata for `tile`, fetching it on first use.
    pub async fn get_metadata(&self, tile: TileId) -> Option<Arc<TileMetadata>> {
        self.metadata.get(tile).await
    }

    /// Get metadata that is already loaded, without waiting.
    pub fn get_metadata_sync(&self, tile: TileId) -> Option<Arc<TileMetadata>> {
        self.metadata.get_cached(tile)
    }

    // =========================================================================
    // Prefetch
    // =========================================================================

    /// Load metadata and the base atlas of each tile at `zoom`, concurrently.
    ///
    /// Individual frames are not sliced. Returns how many tiles are ready.
    pub async fn prefetch(&self, tiles: &[TileId], zoom: f64) -> usize {
        let results = join_all(tiles.iter().map(|&tile| self.bases.load(tile, zoom))).await;

        let mut ready = 0;
        for (tile, result) in tiles.iter().zip(results) {
            match result {
                Ok(_) => ready += 1,
                Err(e) => warn!(%tile, zoom, error = %e, "prefetch failed"),
            }
        }

        debug!(requested = tiles.len(), ready, zoom, "prefetch complete");
        ready
    }

    /// Get a base atlas that is already rasterized.
    pub fn get_base_atlas_sync(
        &self,
        tile: TileId,
        zoom: f64,
    ) -> Option<Arc<RasterizedBaseAtlas>> {
        self.bases.get_cached(tile, ZoomKey::from_zoom(zoom))
    }

    // =========================================================================
    // Invalidation
    // =========================================================================

    /// Drop every frame and base atlas cached for `zoom`.
    ///
    /// Metadata is zoom-independent and survives.
    pub async fn clear_zoom(&self, zoom: f64) {
        let zoom_key = ZoomKey::from_zoom(zoom);

        // Frames are views over the bases; release them first.
        let frames = self.frames.remove_zoom(zoom_key).await;
        for frame in &frames {
            self.textures.release_texture(frame.handle);
        }

        let retired = {
            let mut retired = self.retired.lock().unwrap_or_else(PoisonError::into_inner);
            let (matching, kept): (Vec<_>, Vec<_>) = retired
                .drain(..)
                .partition(|frame| frame.key.zoom_key == zoom_key);
            *retired = kept;
            matching
        };
        for frame in &retired {
            self.textures.release_texture(frame.handle);
        }

        let bases = self.bases.remove_zoom(zoom_key);
        for base in &bases {
            self.textures.release_texture(base.handle);
        }

        debug!(
            %zoom_key,
            frames = frames.len() + retired.len(),
            bases = bases.len(),
            "cleared zoom"
        );
    }

    /// Drop every cache layer and release every handle.
    pub async fn clear_all(&self) {
        let frames = self.frames.drain().await;
        for frame in &frames {
            self.textures.release_texture(frame.handle);
        }

        let retired: Vec<_> = self
            .retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for frame in &retired {
            self.textures.release_texture(frame.handle);
        }

        let bases = self.bases.drain();
        for base in &bases {
            self.textures.release_texture(base.handle);
        }

        self.metadata.clear();

        debug!(
            frames = frames.len() + retired.len(),
            bases = bases.len(),
            "cleared all caches"
        );
    }

    /// Track freshly evicted frames and release every retired frame that
    /// no caller holds any more.
    ///
    /// A frame can only be cloned by someone already holding it, so a strong
    /// count of one under the lock means nothing else can reach it.
    fn retire(&self, evicted: Vec<Arc<FrameTexture>>) {
        let mut retired = self.retired.lock().unwrap_or_else(PoisonError::into_inner);
        retired.extend(evicted);

        let before = retired.len();
        retired.retain(|frame| {
            let held = Arc::strong_count(frame) > 1;
            if !held {
                self.textures.release_texture(frame.handle);
            }
            held
        });

        if retired.len() < before {
            debug!(
                released = before - retired.len(),
                held = retired.len(),
                "released evicted frames"
            );
        }
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Number of frames in the frame cache.
    pub async fn cache_entry_count(&self) -> usize {
        self.frames.len().await
    }

    /// Estimated bytes held by the frame cache.
    pub async fn cache_memory_bytes(&self) -> usize {
        self.frames.size().await
    }

    pub fn memory_budget(&self) -> usize {
        self.frames.capacity()
    }

    /// Evicted frames still held by callers.
    pub fn retired_count(&self) -> usize {
        self.retired
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn base_atlas_count(&self) -> usize {
        self.bases.len()
    }

    pub fn metadata_count(&self) -> usize {
        self.metadata.len()
    }

    /// Metadata fetches and rasterizations currently in flight.
    pub fn pending_loads(&self) -> usize {
        self.metadata.pending() + self.bases.pending()
    }

    pub async fn cache_stats(&self) -> CacheStats {
        CacheStats {
            frame_entries: self.frames.len().await,
            frame_bytes: self.frames.size().await,
            memory_budget: self.frames.capacity(),
            base_atlases: self.bases.len(),
            base_atlas_bytes: self.bases.memory_bytes(),
            retired_frames: self.retired_count(),
            metadata_entries: self.metadata.len(),
            pending_loads: self.pending_loads(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
