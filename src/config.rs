//! Configuration management for the tile atlas cache.
//!
//! Two layers:
//! - [`Config`]: command-line arguments via clap, with `ATLAS_` environment
//!   variable fallbacks, used by the `tile-atlas` binary
//! - [`LoaderConfig`]: the plain settings struct the library consumes
//!
//! # Example
//!
//! ```ignore
//! use tile_atlas::config::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//!
//! let loader_config = config.loader_config();
//! println!("Frame budget: {} bytes", loader_config.memory_budget);
//! ```
//!
//! # Environment Variables
//!
//! - `ATLAS_BASE_URL` - Asset root containing `tiles/{kind}/{id}/` (required)
//! - `ATLAS_MEMORY_BUDGET` - Frame cache budget in bytes (default: 128MB)
//! - `ATLAS_MAX_ENTRIES` - Max cached frames (default: 10000)
//! - `ATLAS_DEVICE_PIXEL_RATIO` - Display pixel density (default: 1.0)
//! - `ATLAS_TEXTURE_SIZE_LIMIT` - Max rasterized atlas dimension (default: 4096)
//! - `ATLAS_LOAD_TIMEOUT_SECS` - Per-load timeout, 0 disables (default: 30)
//! - `ATLAS_ZOOM` - Zoom level to warm the cache at (default: 1.0)

use std::time::Duration;

use clap::Parser;

use crate::atlas::{DEFAULT_FRAME_CACHE_BUDGET, DEFAULT_MAX_ENTRIES};
use crate::io::TileUrls;
use crate::raster::{RasterSettings, DEFAULT_TEXTURE_SIZE_LIMIT};
use crate::tile::TileId;

// =============================================================================
// Default Values
// =============================================================================

/// Default device pixel ratio.
pub const DEFAULT_DEVICE_PIXEL_RATIO: f64 = 1.0;

/// Default load timeout in seconds.
pub const DEFAULT_LOAD_TIMEOUT_SECS: u64 = 30;

/// Default zoom level.
pub const DEFAULT_ZOOM: f64 = 1.0;

/// Smallest accepted texture size limit.
pub const MIN_TEXTURE_SIZE_LIMIT: u32 = 256;

/// Largest accepted texture size limit.
pub const MAX_TEXTURE_SIZE_LIMIT: u32 = 16384;

// =============================================================================
// Loader Configuration
// =============================================================================

/// Settings for [`TileAtlasLoader`](crate::atlas::TileAtlasLoader).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoaderConfig {
    /// Frame cache budget in bytes
    pub memory_budget: usize,

    /// Frame cache entry cap
    pub max_entries: usize,

    pub device_pixel_ratio: f64,

    /// Largest dimension of a rasterized base atlas, in pixels
    pub texture_size_limit: u32,

    /// Bound on each metadata fetch and each rasterization
    pub load_timeout: Option<Duration>,
}

impl LoaderConfig {
    pub fn raster_settings(&self) -> RasterSettings {
        RasterSettings {
            device_pixel_ratio: self.device_pixel_ratio,
            texture_size_limit: self.texture_size_limit,
            timeout: self.load_timeout,
        }
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            memory_budget: DEFAULT_FRAME_CACHE_BUDGET,
            max_entries: DEFAULT_MAX_ENTRIES,
            device_pixel_ratio: DEFAULT_DEVICE_PIXEL_RATIO,
            texture_size_limit: DEFAULT_TEXTURE_SIZE_LIMIT,
            load_timeout: Some(Duration::from_secs(DEFAULT_LOAD_TIMEOUT_SECS)),
        }
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// Tile Atlas - warm a tile atlas cache and report what it holds.
///
/// Fetches tile manifests and atlases from an asset server, rasterizes them
/// at the requested zoom and slices their animation frames.
#[derive(Parser, Debug, Clone)]
#[command(name = "tile-atlas")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Source Configuration
    // =========================================================================
    /// Asset root URL; tiles are read from `{base}/tiles/{kind}/{id}/`.
    #[arg(long, env = "ATLAS_BASE_URL")]
    pub base_url: String,

    /// Tiles to load, as `{kind}_{id}` (e.g. `ground_245`).
    #[arg(required = true)]
    pub tiles: Vec<String>,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Frame cache memory budget in bytes.
    #[arg(long, default_value_t = DEFAULT_FRAME_CACHE_BUDGET, env = "ATLAS_MEMORY_BUDGET")]
    pub memory_budget: usize,

    /// Maximum number of cached frames.
    #[arg(long, default_value_t = DEFAULT_MAX_ENTRIES, env = "ATLAS_MAX_ENTRIES")]
    pub max_entries: usize,

    // =========================================================================
    // Raster Configuration
    // =========================================================================
    /// Display pixel density. Values above 1.1 are capped.
    #[arg(long, default_value_t = DEFAULT_DEVICE_PIXEL_RATIO, env = "ATLAS_DEVICE_PIXEL_RATIO")]
    pub device_pixel_ratio: f64,

    /// Largest dimension of a rasterized atlas, in pixels.
    #[arg(long, default_value_t = DEFAULT_TEXTURE_SIZE_LIMIT, env = "ATLAS_TEXTURE_SIZE_LIMIT")]
    pub texture_size_limit: u32,

    /// Timeout for each metadata fetch and rasterization, in seconds.
    ///
    /// 0 waits indefinitely.
    #[arg(long, default_value_t = DEFAULT_LOAD_TIMEOUT_SECS, env = "ATLAS_LOAD_TIMEOUT_SECS")]
    pub load_timeout_secs: u64,

    /// Zoom level to load at.
    #[arg(long, default_value_t = DEFAULT_ZOOM, env = "ATLAS_ZOOM")]
    pub zoom: f64,

    /// Also slice every animation frame after prefetching.
    #[arg(long, default_value_t = false)]
    pub frames: bool,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.base_url.is_empty() {
            return Err("Base URL is required. Set --base-url or ATLAS_BASE_URL".to_string());
        }
        self.tile_urls()?;

        if self.memory_budget == 0 {
            return Err("memory_budget must be greater than 0".to_string());
        }
        if self.max_entries == 0 {
            return Err("max_entries must be greater than 0".to_string());
        }

        if !(self.device_pixel_ratio.is_finite() && self.device_pixel_ratio > 0.0) {
            return Err("device_pixel_ratio must be a positive number".to_string());
        }
        if !(self.zoom.is_finite() && self.zoom > 0.0) {
            return Err("zoom must be a positive number".to_string());
        }

        if !(MIN_TEXTURE_SIZE_LIMIT..=MAX_TEXTURE_SIZE_LIMIT).contains(&self.texture_size_limit) {
            return Err(format!(
                "texture_size_limit must be between {} and {}",
                MIN_TEXTURE_SIZE_LIMIT, MAX_TEXTURE_SIZE_LIMIT
            ));
        }

        self.tile_ids()?;
        Ok(())
    }

    /// Parse the base URL.
    pub fn tile_urls(&self) -> Result<TileUrls, String> {
        TileUrls::new(&self.base_url)
            .map_err(|e| format!("Invalid base URL '{}': {}", self.base_url, e))
    }

    /// Parse the positional tile keys.
    pub fn tile_ids(&self) -> Result<Vec<TileId>, String> {
        if self.tiles.is_empty() {
            return Err("At least one tile is required".to_string());
        }
        self.tiles
            .iter()
            .map(|key| key.parse::<TileId>().map_err(|e| e.to_string()))
            .collect()
    }

    /// The load timeout, or `None` when disabled.
    pub fn load_timeout(&self) -> Option<Duration> {
        (self.load_timeout_secs > 0).then(|| Duration::from_secs(self.load_timeout_secs))
    }

    pub fn loader_config(&self) -> LoaderConfig {
        LoaderConfig {
            memory_budget: self.memory_budget,
            max_entries: self.max_entries,
            device_pixel_ratio: self.device_pixel_ratio,
            texture_size_limit: self.texture_size_limit,
            load_timeout: self.load_timeout(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
