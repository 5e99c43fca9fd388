//! Binding to the rendering library's texture objects.
//!
//! The cache never owns GPU objects directly. It asks a [`TextureRegistry`]
//! to materialize a view over a bitmap region and later to release it.
//! Release authority stays with the cache's clear operations; eviction only
//! forgets an entry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use image::RgbaImage;

/// Opaque handle to a texture registered with the rendering library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureHandle(pub u64);

/// An integer pixel rectangle within a bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The rectangle covering a whole bitmap.
    pub fn full(image: &RgbaImage) -> Self {
        Self::new(0, 0, image.width(), image.height())
    }

    /// Estimated storage for this region at 32 bits per pixel.
    pub fn memory_bytes(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Materializes and releases GPU-visible views over bitmaps.
pub trait TextureRegistry: Send + Sync {
    /// Register a view of `region` within `source`.
    fn register_texture(&self, source: &RgbaImage, region: PixelRect) -> TextureHandle;

    /// Release a previously registered view.
    fn release_texture(&self, handle: TextureHandle);
}

/// In-process registry that hands out sequential handles and tracks which
/// ones are live.
///
/// Useful headless (CLI, tests) and as the accounting layer in front of a
/// real renderer.
#[derive(Debug, Default)]
pub struct LocalTextureRegistry {
    next: AtomicU64,
    live: Mutex<HashMap<TextureHandle, PixelRect>>,
}

impl LocalTextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered handles not yet released.
    pub fn live_count(&self) -> usize {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_live(&self, handle: TextureHandle) -> bool {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&handle)
    }

    /// Region a live handle was registered with.
    pub fn region(&self, handle: TextureHandle) -> Option<PixelRect> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle)
            .copied()
    }
}

impl TextureRegistry for LocalTextureRegistry {
    fn register_texture(&self, _source: &RgbaImage, region: PixelRect) -> TextureHandle {
        let handle = TextureHandle(self.next.fetch_add(1, Ordering::Relaxed) + 1);
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(handle, region);
        handle
    }

    fn release_texture(&self, handle: TextureHandle) {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle);
    }
}
