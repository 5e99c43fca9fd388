//! Frame textures and the loader that owns every cache layer.
//!
//! # Components
//!
//! - [`FrameCache`]: LRU of frame views bounded by a byte budget
//! - [`TileAtlasLoader`]: the public load, prefetch and clear surface

mod cache;
mod loader;

pub use cache::{
    frame_pixel_rect, FrameCache, FrameKey, FrameTexture, Inserted, DEFAULT_FRAME_CACHE_BUDGET,
    DEFAULT_MAX_ENTRIES,
};
pub use loader::{CacheStats, TileAtlasLoader};
