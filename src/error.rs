use std::time::Duration;

use thiserror::Error;

use crate::tile::TileId;

/// Errors that can occur when fetching tile documents or sources
#[derive(Debug, Clone, Error)]
pub enum FetchError {
    /// Resource does not exist (HTTP 404 or equivalent)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Server answered with a non-success status
    #[error("Request to {url} failed with status {status}")]
    Status { url: String, status: u16 },

    /// Network or connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Body could not be parsed as the expected document
    #[error("Failed to parse {url}: {message}")]
    Parse { url: String, message: String },
}

/// Errors raised while turning a tile source into a bitmap
#[derive(Debug, Clone, Error)]
pub enum RasterError {
    /// Source bytes could not be fetched
    #[error("Failed to fetch raster source: {0}")]
    Fetch(#[from] FetchError),

    /// Source bytes could not be decoded into an image
    #[error("Decode error: {0}")]
    Decode(String),

    /// Rasterization produced no pixels
    #[error("Rasterization produced an empty {width}x{height} bitmap")]
    EmptyOutput { width: u32, height: u32 },
}

/// Errors produced by the loading pipeline.
///
/// These never cross the public loader surface: the loader logs them and
/// hands callers `None` instead.
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    /// Metadata could not be fetched or parsed
    #[error("Metadata unavailable: {0}")]
    Fetch(#[from] FetchError),

    /// The rasterizer failed
    #[error("Rasterization failed: {0}")]
    Raster(#[from] RasterError),

    /// A load did not settle within the configured timeout
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// The tile has no descriptor for the requested frame
    #[error("Tile {tile} has no frame {frame}")]
    MissingFrame { tile: TileId, frame: u32 },

    /// The frame rectangle is empty once clamped to the raster
    #[error("Frame {frame} of tile {tile} is empty at this resolution")]
    EmptyFrame { tile: TileId, frame: u32 },
}

impl LoadError {
    /// The tile (or one of its documents) does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            LoadError::Fetch(FetchError::NotFound(_))
                | LoadError::Raster(RasterError::Fetch(FetchError::NotFound(_)))
        )
    }

    /// Network, decode or timeout failures that may succeed on the next call.
    pub fn is_transient(&self) -> bool {
        match self {
            LoadError::Fetch(FetchError::NotFound(_)) => false,
            LoadError::Fetch(_) | LoadError::Timeout { .. } => true,
            LoadError::Raster(RasterError::Fetch(FetchError::NotFound(_))) => false,
            LoadError::Raster(_) => true,
            LoadError::MissingFrame { .. } | LoadError::EmptyFrame { .. } => false,
        }
    }
}

/// A tile key string that is not of the form `{kind}_{id}`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid tile key '{key}': {reason}")]
pub struct ParseTileIdError {
    pub key: String,
    pub reason: &'static str,
}
