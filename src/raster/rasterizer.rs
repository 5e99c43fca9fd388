//! Rasterization of tile sources.
//!
//! The cache treats rasterization as opaque: it hands a [`RasterSource`] and
//! a target scale to a [`Rasterizer`] and receives a bitmap back.
//!
//! [`ImageRasterizer`] is the bundled implementation for bitmap sources
//! (PNG/JPEG). It fetches the source, decodes it and resamples it to the
//! logical atlas size times the scale. Vector sources need a rasterizer
//! supplied by the embedding application.

use std::io::Cursor;

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{ImageReader, RgbaImage};

use crate::error::RasterError;
use crate::io::TileFetcher;
use crate::tile::{TileId, TileMetadata};

/// What to rasterize.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSource {
    pub tile: TileId,
    pub url: String,

    /// Logical (1x) atlas width
    pub logical_width: u32,

    /// Logical (1x) atlas height
    pub logical_height: u32,
}

impl RasterSource {
    pub fn from_metadata(metadata: &TileMetadata) -> Self {
        Self {
            tile: metadata.tile,
            url: metadata.source_url.clone(),
            logical_width: metadata.width,
            logical_height: metadata.height,
        }
    }

    /// Pixel size of the source at `scale`, at least 1x1.
    pub fn target_size(&self, scale: f64) -> (u32, u32) {
        let scaled = |logical: u32| ((logical as f64 * scale).round() as u32).max(1);
        (scaled(self.logical_width), scaled(self.logical_height))
    }
}

/// Converts a tile source into a pixel bitmap at a given scale.
#[async_trait]
pub trait Rasterizer: Send + Sync {
    async fn rasterize(&self, source: &RasterSource, scale: f64)
        -> Result<RgbaImage, RasterError>;
}

// =============================================================================
// Image Rasterizer
// =============================================================================

/// Rasterizer for bitmap sources using the `image` crate.
#[derive(Debug, Clone)]
pub struct ImageRasterizer<F> {
    fetcher: F,
}

impl<F: TileFetcher> ImageRasterizer<F> {
    pub fn new(fetcher: F) -> Self {
        Self { fetcher }
    }

    /// Decode `bytes` and resample to the target size for `scale`.
    pub fn rasterize_bytes(
        &self,
        bytes: &[u8],
        source: &RasterSource,
        scale: f64,
    ) -> Result<RgbaImage, RasterError> {
        let reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| RasterError::Decode(e.to_string()))?;

        let decoded = reader
            .decode()
            .map_err(|e| RasterError::Decode(e.to_string()))?
            .into_rgba8();

        if decoded.width() == 0 || decoded.height() == 0 {
            return Err(RasterError::EmptyOutput {
                width: decoded.width(),
                height: decoded.height(),
            });
        }

        let (width, height) = source.target_size(scale);
        if (decoded.width(), decoded.height()) == (width, height) {
            return Ok(decoded);
        }

        Ok(imageops::resize(&decoded, width, height, FilterType::Triangle))
    }
}

#[async_trait]
impl<F: TileFetcher> Rasterizer for ImageRasterizer<F> {
    async fn rasterize(
        &self,
        source: &RasterSource,
        scale: f64,
    ) -> Result<RgbaImage, RasterError> {
        let bytes = self.fetcher.fetch(&source.url).await?;
        self.rasterize_bytes(&bytes, source, scale)
    }
}

// =============================================================================
// Tests
// =============================================================================
