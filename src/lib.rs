//! # Tile Atlas
//!
//! A resource cache for animated map tiles.
//!
//! Each tile ships a manifest and an atlas layout describing its animation
//! frames. The cache fetches both documents, rasterizes the tile's atlas once
//! per zoom level, and slices individual frames out of the rasterized atlas
//! on demand.
//!
//! ## Features
//!
//! - **Request coalescing**: concurrent loads of the same resource share one fetch or rasterization
//! - **Multi-level caching**: metadata per tile, base rasters per zoom, frames under a byte budget
//! - **Texture size clamping**: oversized atlases are rasterized at a lower scale rather than failing
//! - **Fail-soft loads**: failures are logged and reported as `None`, and retried on the next call
//! - **Targeted invalidation**: drop one zoom level without losing metadata
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`io`] - Fetch abstraction, asset URLs and the in-flight request ledger
//! - [`tile`] - Tile identity, manifest/atlas documents and the metadata store
//! - [`raster`] - Zoom keys, rasterization, texture registration and base atlases
//! - [`atlas`] - Frame cache and the [`TileAtlasLoader`] lifecycle controller
//! - [`config`] - CLI and loader configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tile_atlas::{
//!     HttpFetcher, ImageRasterizer, LoaderConfig, LocalTextureRegistry, TileAtlasLoader, TileId,
//!     TileUrls,
//! };
//!
//! #[tokio::main]
//! async fn main() {
//!     let urls = TileUrls::new("https://cdn.example.com/assets/").unwrap();
//!     let fetcher = HttpFetcher::new();
//!     let loader = TileAtlasLoader::new(
//!         fetcher.clone(),
//!         urls,
//!         ImageRasterizer::new(fetcher),
//!         Arc::new(LocalTextureRegistry::new()),
//!         LoaderConfig::default(),
//!     );
//!
//!     let tile = TileId::ground(245);
//!     loader.prefetch(&[tile], 1.0).await;
//!     for frame in loader.load_animation_frames(tile, 1.0).await {
//!         println!("frame {} at {:?}", frame.key.frame, frame.rect);
//!     }
//! }
//! ```

pub mod atlas;
pub mod config;
pub mod error;
pub mod io;
pub mod raster;
pub mod tile;

// Re-export commonly used types
pub use atlas::{
    frame_pixel_rect, CacheStats, FrameCache, FrameKey, FrameTexture, TileAtlasLoader,
    DEFAULT_FRAME_CACHE_BUDGET, DEFAULT_MAX_ENTRIES,
};
pub use config::{Config, LoaderConfig};
pub use error::{FetchError, LoadError, ParseTileIdError, RasterError};
pub use io::{fetch_json, HttpFetcher, RequestLedger, TileFetcher, TileUrls};
pub use raster::{
    BaseAtlasStore, ImageRasterizer, LocalTextureRegistry, PixelRect, RasterSettings, RasterSource,
    RasterizedBaseAtlas, Rasterizer, TextureHandle, TextureRegistry, ZoomKey,
    DEFAULT_TEXTURE_SIZE_LIMIT, MAX_DEVICE_PIXEL_RATIO,
};
pub use tile::{
    AtlasFrame, AtlasLayout, FrameDescriptor, ManifestAnimation, MetadataStore, TileBehavior,
    TileId, TileKind, TileManifest, TileMetadata,
};
