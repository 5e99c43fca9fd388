//! Base atlas rasterization and caching.
//!
//! Each tile is rasterized once per [`ZoomKey`]. Concurrent requests for the
//! same tile and effective scale share a single rasterization through the
//! request ledger. Failures are not cached, so a later call retries.
//!
//! # Scale
//!
//! The target scale is `min(device_pixel_ratio, 1.1) * zoom`, clamped so the
//! largest bitmap dimension stays within the texture size limit. Oversized
//! requests are served at a lower resolution rather than failing.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use image::RgbaImage;
use tracing::{debug, warn};

use crate::error::{LoadError, RasterError};
use crate::io::{with_timeout, RequestLedger, TileFetcher};
use crate::tile::{MetadataStore, TileId};

use super::rasterizer::{RasterSource, Rasterizer};
use super::texture::{PixelRect, TextureHandle, TextureRegistry};
use super::zoom::ZoomKey;

/// Default ceiling for the largest dimension of a rasterized atlas.
pub const DEFAULT_TEXTURE_SIZE_LIMIT: u32 = 4096;

/// Device pixel ratios above this are not worth the extra memory.
pub const MAX_DEVICE_PIXEL_RATIO: f64 = 1.1;

type RasterResult = Result<Arc<RasterizedBaseAtlas>, LoadError>;

// =============================================================================
// Settings
// =============================================================================

/// Parameters controlling rasterization resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RasterSettings {
    pub device_pixel_ratio: f64,
    pub texture_size_limit: u32,
    pub timeout: Option<Duration>,
}

impl RasterSettings {
    /// Effective rasterization scale for a tile of the given logical size.
    pub fn scale_for(&self, zoom: f64, logical_width: u32, logical_height: u32) -> f64 {
        let scale = self.device_pixel_ratio.min(MAX_DEVICE_PIXEL_RATIO) * zoom;
        let largest = logical_width.max(logical_height) as f64;
        let limit = self.texture_size_limit as f64;

        if largest > 0.0 && largest * scale > limit {
            limit / largest
        } else {
            scale
        }
    }
}

impl Default for RasterSettings {
    fn default() -> Self {
        Self {
            device_pixel_ratio: 1.0,
            texture_size_limit: DEFAULT_TEXTURE_SIZE_LIMIT,
            timeout: None,
        }
    }
}

// =============================================================================
// Rasterized Base Atlas
// =============================================================================

/// A tile's atlas rasterized for one zoom key.
///
/// Frame textures are views into this bitmap and keep it alive through an
/// `Arc`; releasing [`RasterizedBaseAtlas::handle`] is reserved to the
/// loader's clear operations.
#[derive(Debug)]
pub struct RasterizedBaseAtlas {
    pub tile: TileId,
    pub zoom_key: ZoomKey,

    /// Scale requested from the rasterizer (after clamping)
    pub scale: f64,

    pub image: RgbaImage,
    pub handle: TextureHandle,
}

impl RasterizedBaseAtlas {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn memory_bytes(&self) -> usize {
        PixelRect::full(&self.image).memory_bytes()
    }
}

// =============================================================================
// Base Atlas Store
// =============================================================================

/// Cache of rasterized base atlases keyed by tile and zoom key.
pub struct BaseAtlasStore<F, R> {
    metadata: Arc<MetadataStore<F>>,
    rasterizer: R,
    textures: Arc<dyn TextureRegistry>,
    settings: RasterSettings,

    /// Rasters per tile, one per zoom key
    rasters: RwLock<HashMap<TileId, HashMap<ZoomKey, Arc<RasterizedBaseAtlas>>>>,

    /// In-flight rasterizations keyed by tile and exact scale bits
    in_flight: RequestLedger<(TileId, u64), RasterResult>,
}

impl<F: TileFetcher, R: Rasterizer> BaseAtlasStore<F, R> {
    pub fn new(
        metadata: Arc<MetadataStore<F>>,
        rasterizer: R,
        textures: Arc<dyn TextureRegistry>,
        settings: RasterSettings,
    ) -> Self {
        Self {
            metadata,
            rasterizer,
            textures,
            settings,
            rasters: RwLock::new(HashMap::new()),
            in_flight: RequestLedger::new(),
        }
    }

    pub fn settings(&self) -> &RasterSettings {
        &self.settings
    }

    /// Get the base atlas of `tile` at `zoom`, rasterizing it on first use.
    ///
    /// Failures are logged and reported as `None`.
    pub async fn get(&self, tile: TileId, zoom: f64) -> Option<Arc<RasterizedBaseAtlas>> {
        match self.load(tile, zoom).await {
            Ok(atlas) => Some(atlas),
            Err(e) => {
                warn!(%tile, zoom, error = %e, "base atlas unavailable");
                None
            }
        }
    }

    /// Get a base atlas that is already rasterized.
    pub fn get_cached(&self, tile: TileId, zoom_key: ZoomKey) -> Option<Arc<RasterizedBaseAtlas>> {
        self.rasters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&tile)
            .and_then(|by_zoom| by_zoom.get(&zoom_key))
            .cloned()
    }

    /// Get the base atlas of `tile` at `zoom`, rasterizing it on first use.
    pub async fn load(&self, tile: TileId, zoom: f64) -> RasterResult {
        let zoom_key = ZoomKey::from_zoom(zoom);
        if let Some(atlas) = self.get_cached(tile, zoom_key) {
            return Ok(atlas);
        }

        let metadata = self.metadata.load(tile).await?;
        let source = RasterSource::from_metadata(&metadata);
        let scale = self
            .settings
            .scale_for(zoom, metadata.width, metadata.height);

        self.in_flight
            .dedupe((tile, scale.to_bits()), || async {
                // Another leader may have settled since the fast path
                if let Some(atlas) = self.get_cached(tile, zoom_key) {
                    return Ok(atlas);
                }

                let image = with_timeout(
                    self.settings.timeout,
                    "rasterize",
                    self.rasterizer.rasterize(&source, scale),
                )
                .await?;

                if image.width() == 0 || image.height() == 0 {
                    return Err(RasterError::EmptyOutput {
                        width: image.width(),
                        height: image.height(),
                    }
                    .into());
                }

                let handle = self
                    .textures
                    .register_texture(&image, PixelRect::full(&image));
                debug!(
                    %tile,
                    %zoom_key,
                    scale,
                    width = image.width(),
                    height = image.height(),
                    "base atlas rasterized"
                );

                Ok(self.insert(Arc::new(RasterizedBaseAtlas {
                    tile,
                    zoom_key,
                    scale,
                    image,
                    handle,
                })))
            })
            .await
    }

    /// Store a fresh raster unless one already occupies its slot.
    ///
    /// The stored raster always wins; a losing duplicate's handle is
    /// released before it is dropped.
    fn insert(&self, atlas: Arc<RasterizedBaseAtlas>) -> Arc<RasterizedBaseAtlas> {
        let mut rasters = self.rasters.write().unwrap_or_else(PoisonError::into_inner);
        let slot = rasters
            .entry(atlas.tile)
            .or_default()
            .entry(atlas.zoom_key);

        match slot {
            Entry::Occupied(existing) => {
                self.textures.release_texture(atlas.handle);
                existing.get().clone()
            }
            Entry::Vacant(vacant) => vacant.insert(atlas).clone(),
        }
    }

    /// Remove every raster for `zoom_key`, returning them for release.
    pub fn remove_zoom(&self, zoom_key: ZoomKey) -> Vec<Arc<RasterizedBaseAtlas>> {
        let mut rasters = self.rasters.write().unwrap_or_else(PoisonError::into_inner);
        let removed = rasters
            .values_mut()
            .filter_map(|by_zoom| by_zoom.remove(&zoom_key))
            .collect();
        rasters.retain(|_, by_zoom| !by_zoom.is_empty());
        removed
    }

    /// Remove every raster, returning them for release.
    pub fn drain(&self) -> Vec<Arc<RasterizedBaseAtlas>> {
        self.rasters
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .flat_map(|(_, by_zoom)| by_zoom.into_values())
            .collect()
    }

    /// Number of cached rasters across all tiles and zoom keys.
    pub fn len(&self) -> usize {
        self.rasters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(HashMap::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Estimated bytes held by all cached rasters.
    pub fn memory_bytes(&self) -> usize {
        self.rasters
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .flat_map(HashMap::values)
            .map(|atlas| atlas.memory_bytes())
            .sum()
    }

    /// Number of rasterizations currently in flight.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
