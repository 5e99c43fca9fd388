//! Base atlas rasterization.
//!
//! # Components
//!
//! - [`ZoomKey`]: zoom rounded to two decimals, bounding raster variants per tile
//! - [`Rasterizer`]: turns a tile source into a bitmap at a scale
//! - [`TextureRegistry`]: registers and releases views with the renderer
//! - [`BaseAtlasStore`]: one rasterized atlas per tile and zoom key

mod rasterizer;
mod store;
mod texture;
mod zoom;

pub use rasterizer::{ImageRasterizer, RasterSource, Rasterizer};
pub use store::{
    BaseAtlasStore, RasterSettings, RasterizedBaseAtlas, DEFAULT_TEXTURE_SIZE_LIMIT,
    MAX_DEVICE_PIXEL_RATIO,
};
pub use texture::{LocalTextureRegistry, PixelRect, TextureHandle, TextureRegistry};
pub use zoom::ZoomKey;
