//! Tile documents and the merged metadata record.
//!
//! Each tile is described by two small JSON documents:
//!
//! - `manifest.json`: the logical manifest (sprite id, animations, source file)
//! - `atlas.json`: the atlas layout (logical size, placement offset, frame rectangles)
//!
//! Both are merged into a single immutable [`TileMetadata`] once loaded.
//! Frame rectangles are kept in logical (1x) units; the frame cache maps them
//! to pixels using the actual scale of the rasterized atlas.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use super::TileId;

// =============================================================================
// Wire Documents
// =============================================================================

/// Per-tile manifest (`manifest.json`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileManifest {
    pub sprite_id: String,

    /// Animations keyed by name; sorted so the primary animation is stable.
    #[serde(default)]
    pub animations: BTreeMap<String, ManifestAnimation>,

    #[serde(default)]
    pub behavior: Option<TileBehavior>,
}

/// One animation entry of a manifest.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestAnimation {
    pub frame_count: u32,
    pub atlas_width: u32,
    pub atlas_height: u32,

    /// Source image, relative to the tile directory
    pub file: String,

    #[serde(default)]
    pub fps: Option<f32>,

    #[serde(default, rename = "loop")]
    pub looped: Option<bool>,

    #[serde(default)]
    pub autoplay: Option<bool>,
}

/// Per-tile atlas layout (`atlas.json`).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtlasLayout {
    pub width: u32,
    pub height: u32,

    #[serde(default)]
    pub offset_x: f64,

    #[serde(default)]
    pub offset_y: f64,

    #[serde(default)]
    pub frames: Vec<AtlasFrame>,

    /// Playback order as frame ids; empty means `frames` order
    #[serde(default)]
    pub frame_order: Vec<String>,

    /// Frames that reuse another frame's pixels: `frameId -> originalFrameId`
    #[serde(default)]
    pub duplicates: HashMap<String, String>,

    #[serde(default)]
    pub fps: Option<f32>,
}

/// A frame rectangle within the atlas, in logical units.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtlasFrame {
    pub id: String,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,

    #[serde(default)]
    pub offset_x: f64,

    #[serde(default)]
    pub offset_y: f64,
}

// =============================================================================
// Merged Metadata
// =============================================================================

/// How a tile is played back by the map renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileBehavior {
    Static,
    Animated,
    Random,
    Slope,
}

/// A single animation frame's rectangle within the atlas, in logical units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameDescriptor {
    pub index: u32,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    pub trim_offset_x: f64,
    pub trim_offset_y: f64,
}

/// Everything the cache knows about a tile, independent of zoom.
///
/// Loaded once per [`TileId`] and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct TileMetadata {
    pub tile: TileId,
    pub sprite_id: String,

    /// Logical atlas width in pixels at 1x
    pub width: u32,

    /// Logical atlas height in pixels at 1x
    pub height: u32,

    pub offset_x: f64,
    pub offset_y: f64,
    pub frame_count: u32,
    pub behavior: TileBehavior,
    pub fps: Option<f32>,
    pub looped: Option<bool>,
    pub autoplay: Option<bool>,

    /// Frames ordered by index
    pub frames: Vec<FrameDescriptor>,

    /// URL of the source image handed to the rasterizer
    pub source_url: String,
}

impl TileMetadata {
    /// Merge a manifest and an atlas layout into one record.
    ///
    /// `resolve_source` maps the manifest's relative source file to a URL.
    /// Fails when the manifest declares no animation to rasterize.
    pub fn from_documents(
        tile: TileId,
        manifest: TileManifest,
        atlas: AtlasLayout,
        resolve_source: impl FnOnce(&str) -> String,
    ) -> Result<Self, String> {
        let (_, animation) = manifest
            .animations
            .iter()
            .next()
            .ok_or_else(|| "manifest declares no animations".to_string())?;

        let frames = resolve_frames(&atlas);
        let frame_count = if animation.frame_count > 0 {
            animation.frame_count
        } else {
            frames.len() as u32
        };

        let behavior = manifest.behavior.unwrap_or(if frame_count > 1 {
            TileBehavior::Animated
        } else {
            TileBehavior::Static
        });

        Ok(Self {
            tile,
            sprite_id: manifest.sprite_id.clone(),
            width: atlas.width,
            height: atlas.height,
            offset_x: atlas.offset_x,
            offset_y: atlas.offset_y,
            frame_count,
            behavior,
            fps: animation.fps.or(atlas.fps),
            looped: animation.looped,
            autoplay: animation.autoplay,
            frames,
            source_url: resolve_source(&animation.file),
        })
    }

    /// Look up the descriptor for a frame index.
    pub fn frame(&self, index: u32) -> Option<&FrameDescriptor> {
        self.frames
            .binary_search_by_key(&index, |f| f.index)
            .ok()
            .map(|i| &self.frames[i])
    }

    pub fn is_animated(&self) -> bool {
        self.frame_count > 1
    }
}

/// Build frame descriptors in playback order.
///
/// Ids in `frame_order` are resolved through `duplicates` to the frame that
/// actually holds the pixels. Ids that resolve to nothing leave a gap: the
/// index is skipped so later frames keep their position.
fn resolve_frames(atlas: &AtlasLayout) -> Vec<FrameDescriptor> {
    let by_id: HashMap<&str, &AtlasFrame> =
        atlas.frames.iter().map(|f| (f.id.as_str(), f)).collect();

    let describe = |index: usize, frame: &AtlasFrame| FrameDescriptor {
        index: index as u32,
        x: frame.x,
        y: frame.y,
        width: frame.width,
        height: frame.height,
        trim_offset_x: frame.offset_x,
        trim_offset_y: frame.offset_y,
    };

    if atlas.frame_order.is_empty() {
        return atlas
            .frames
            .iter()
            .enumerate()
            .map(|(index, frame)| describe(index, frame))
            .collect();
    }

    atlas
        .frame_order
        .iter()
        .enumerate()
        .filter_map(|(index, id)| {
            let original = atlas.duplicates.get(id).unwrap_or(id);
            by_id
                .get(original.as_str())
                .map(|frame| describe(index, frame))
        })
        .collect()
}

// =============================================================================
// Tests
// =============================================================================
