//! Frame texture cache.
//!
//! An LRU cache of animation-frame views sliced from rasterized base
//! atlases, bounded by an estimated memory budget.
//!
//! # Cache Key
//!
//! Frames are cached by a composite key:
//! - Tile identity
//! - Zoom key (zoom rounded to two decimals)
//! - Frame index
//!
//! # Size-Based Eviction
//!
//! Each entry is charged `width * height * 4` bytes. Before an insert that
//! would exceed the budget, least-recently-used entries are evicted until the
//! new entry fits. An entry larger than the whole budget is still admitted
//! once everything else has been evicted.
//!
//! Eviction only forgets an entry. Frames are views over a shared base
//! raster, so the cache never releases their textures. Evicted entries are
//! handed back to the caller, and releasing them is left to the loader's
//! clear operations.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::RwLock;
use tracing::debug;

use crate::raster::{PixelRect, RasterizedBaseAtlas, TextureHandle, ZoomKey};
use crate::tile::{FrameDescriptor, TileId};

/// Default memory budget: 128MB
pub const DEFAULT_FRAME_CACHE_BUDGET: usize = 128 * 1024 * 1024;

/// Default maximum number of entries (to bound LRU overhead)
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

// =============================================================================
// Cache Key
// =============================================================================

/// Cache key for frame textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameKey {
    pub tile: TileId,
    pub zoom_key: ZoomKey,
    pub frame: u32,
}

impl FrameKey {
    pub fn new(tile: TileId, zoom_key: ZoomKey, frame: u32) -> Self {
        Self {
            tile,
            zoom_key,
            frame,
        }
    }
}

// =============================================================================
// Frame Texture
// =============================================================================

/// One animation frame: a view over a rasterized base atlas.
///
/// Holds the base atlas alive, so the pixels stay valid for as long as a
/// renderer keeps the frame, even after the cache has dropped it.
#[derive(Debug)]
pub struct FrameTexture {
    pub key: FrameKey,
    pub base: Arc<RasterizedBaseAtlas>,

    /// Region of the base raster covered by this frame
    pub rect: PixelRect,

    pub handle: TextureHandle,

    /// Trim offset in logical units, for placement
    pub trim_offset: (f64, f64),
}

impl FrameTexture {
    /// Estimated storage charged against the cache budget.
    pub fn memory_bytes(&self) -> usize {
        self.rect.memory_bytes()
    }

    /// Copy the frame's pixels out of the base raster.
    pub fn to_image(&self) -> image::RgbaImage {
        image::imageops::crop_imm(
            &self.base.image,
            self.rect.x,
            self.rect.y,
            self.rect.width,
            self.rect.height,
        )
        .to_image()
    }
}

/// Map a frame's logical rectangle onto a raster of the given pixel size.
///
/// The raster's actual scale is `raster_width / logical_width`, which may
/// differ slightly from the requested scale after clamping. The rectangle is
/// rounded to whole pixels and trimmed at the raster's edges. Returns `None`
/// when nothing of the frame remains.
pub fn frame_pixel_rect(
    frame: &FrameDescriptor,
    logical_width: u32,
    raster_width: u32,
    raster_height: u32,
) -> Option<PixelRect> {
    if logical_width == 0 {
        return None;
    }
    let scale = raster_width as f64 / logical_width as f64;
    let px = |v: u32| (v as f64 * scale).round() as i64;

    let (x, y) = (px(frame.x), px(frame.y));
    let mut width = px(frame.width);
    let mut height = px(frame.height);

    if x + width > raster_width as i64 {
        width = raster_width as i64 - x;
    }
    if y + height > raster_height as i64 {
        height = raster_height as i64 - y;
    }
    if width <= 0 || height <= 0 {
        return None;
    }

    Some(PixelRect::new(
        x as u32,
        y as u32,
        width as u32,
        height as u32,
    ))
}

// =============================================================================
// Frame Cache
// =============================================================================

/// Outcome of [`FrameCache::insert`].
#[derive(Debug)]
pub struct Inserted {
    /// The frame now cached under the key
    pub frame: Arc<FrameTexture>,

    /// Entries pushed out to make room, least recently used first
    pub evicted: Vec<Arc<FrameTexture>>,
}

struct Entries {
    lru: LruCache<FrameKey, Arc<FrameTexture>>,

    /// Sum of `memory_bytes` over all entries
    current_size: usize,
}

/// LRU cache for frame textures with a byte budget.
///
/// # Thread Safety
///
/// The cache is thread-safe and can be shared across async tasks via `Arc`.
pub struct FrameCache {
    entries: RwLock<Entries>,

    /// Memory budget in bytes
    max_size: usize,
}

impl FrameCache {
    /// Create a new frame cache with the default budget (128MB).
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_FRAME_CACHE_BUDGET)
    }

    /// Create a new frame cache with the given budget in bytes.
    pub fn with_capacity(max_size: usize) -> Self {
        Self::with_capacity_and_entries(max_size, DEFAULT_MAX_ENTRIES)
    }

    /// Create a new frame cache with a byte budget and an entry cap.
    ///
    /// A zero entry cap is treated as one.
    pub fn with_capacity_and_entries(max_size: usize, max_entries: usize) -> Self {
        let cap = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: RwLock::new(Entries {
                lru: LruCache::new(cap),
                current_size: 0,
            }),
            max_size,
        }
    }

    /// Get a frame, marking it as most recently used.
    pub async fn get(&self, key: &FrameKey) -> Option<Arc<FrameTexture>> {
        let mut entries = self.entries.write().await;
        entries.lru.get(key).cloned()
    }

    /// Check if a frame is cached without updating LRU order.
    pub async fn contains(&self, key: &FrameKey) -> bool {
        let entries = self.entries.read().await;
        entries.lru.contains(key)
    }

    /// Store a frame, evicting least-recently-used entries to make room.
    ///
    /// If the key is already cached, the cached frame is kept, marked as
    /// recently used, and returned instead of `frame`. Callers compare
    /// [`Inserted::frame`] with their own using `Arc::ptr_eq` to learn
    /// whether it was stored.
    pub async fn insert(&self, frame: Arc<FrameTexture>) -> Inserted {
        let mut entries = self.entries.write().await;

        if let Some(existing) = entries.lru.get(&frame.key) {
            return Inserted {
                frame: existing.clone(),
                evicted: Vec::new(),
            };
        }

        let size = frame.memory_bytes();
        let mut evicted = Vec::new();
        while entries.current_size + size > self.max_size {
            match entries.lru.pop_lru() {
                Some((_, old)) => {
                    entries.current_size = entries.current_size.saturating_sub(old.memory_bytes());
                    evicted.push(old);
                }
                None => break,
            }
        }

        // The entry cap may push out one more LRU entry.
        if let Some((_, old)) = entries.lru.push(frame.key, frame.clone()) {
            entries.current_size = entries.current_size.saturating_sub(old.memory_bytes());
            evicted.push(old);
        }
        entries.current_size += size;

        if !evicted.is_empty() {
            debug!(
                evicted = evicted.len(),
                size = entries.current_size,
                budget = self.max_size,
                "frame cache evicted entries"
            );
        }

        Inserted { frame, evicted }
    }

    /// Remove a single frame.
    pub async fn remove(&self, key: &FrameKey) -> Option<Arc<FrameTexture>> {
        let mut entries = self.entries.write().await;
        let frame = entries.lru.pop(key)?;
        entries.current_size = entries.current_size.saturating_sub(frame.memory_bytes());
        Some(frame)
    }

    /// Remove every frame cached for `zoom_key`.
    pub async fn remove_zoom(&self, zoom_key: ZoomKey) -> Vec<Arc<FrameTexture>> {
        let mut entries = self.entries.write().await;

        let keys: Vec<FrameKey> = entries
            .lru
            .iter()
            .filter(|(key, _)| key.zoom_key == zoom_key)
            .map(|(key, _)| *key)
            .collect();

        let mut removed = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(frame) = entries.lru.pop(&key) {
                entries.current_size = entries.current_size.saturating_sub(frame.memory_bytes());
                removed.push(frame);
            }
        }
        removed
    }

    /// Remove every frame.
    pub async fn drain(&self) -> Vec<Arc<FrameTexture>> {
        let mut entries = self.entries.write().await;
        let mut removed = Vec::with_capacity(entries.lru.len());
        while let Some((_, frame)) = entries.lru.pop_lru() {
            removed.push(frame);
        }
        entries.current_size = 0;
        removed
    }

    /// Get the current number of cached frames.
    pub async fn len(&self) -> usize {
        self.entries.read().await.lru.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.lru.is_empty()
    }

    /// Get the current estimated size of cached frames in bytes.
    pub async fn size(&self) -> usize {
        self.entries.read().await.current_size
    }

    /// Get the memory budget in bytes.
    pub fn capacity(&self) -> usize {
        self.max_size
    }
}

impl Default for FrameCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
