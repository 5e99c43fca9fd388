//! Test utilities for integration tests.
//!
//! This module provides mock fetch and rasterize collaborators that count
//! their calls, plus helpers for building tile documents.

use async_trait::async_trait;
use bytes::Bytes;
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tile_atlas::error::{FetchError, RasterError};
use tile_atlas::io::{TileFetcher, TileUrls};
use tile_atlas::raster::{LocalTextureRegistry, RasterSource, Rasterizer};
use tile_atlas::{LoaderConfig, TileAtlasLoader, TileId};

/// Asset root used by every mock.
pub const BASE_URL: &str = "mock://assets/";

// =============================================================================
// Tile Documents
// =============================================================================

/// Manifest JSON for a tile with a single animation.
pub fn manifest_json(tile: TileId, frame_count: u32, width: u32, height: u32) -> String {
    format!(
        r#"{{ "spriteId": "{tile}", "animations": {{ "idle": {{
            "frameCount": {frame_count}, "atlasWidth": {width}, "atlasHeight": {height},
            "file": "atlas.svg" }} }} }}"#
    )
}

/// Atlas JSON for `frame_count` frames of `frame_width x frame_height`
/// laid out left to right.
pub fn strip_atlas_json(frame_count: u32, frame_width: u32, frame_height: u32) -> String {
    let frames: Vec<String> = (0..frame_count)
        .map(|i| {
            format!(
                r#"{{ "id": "f{i}", "x": {}, "y": 0, "width": {frame_width}, "height": {frame_height} }}"#,
                i * frame_width
            )
        })
        .collect();
    format!(
        r#"{{ "width": {}, "height": {frame_height}, "frames": [{}], "fps": 8 }}"#,
        frame_count * frame_width,
        frames.join(", ")
    )
}

// =============================================================================
// Mock Fetcher with Request Tracking
// =============================================================================

/// In-memory fetcher serving documents by URL.
///
/// Clones share documents, counters and switches, so a test can keep a
/// handle while the loader owns another.
#[derive(Clone, Default)]
pub struct MockFetcher {
    documents: Arc<Mutex<HashMap<String, Bytes>>>,
    requests: Arc<Mutex<Vec<String>>>,
    failures_left: Arc<AtomicUsize>,
    delay: Arc<Mutex<Option<Duration>>>,
    stalled: Arc<AtomicBool>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve a tile whose frames form a horizontal strip.
    pub fn with_strip_tile(
        self,
        tile: TileId,
        frame_count: u32,
        frame_width: u32,
        frame_height: u32,
    ) -> Self {
        let manifest = manifest_json(tile, frame_count, frame_count * frame_width, frame_height);
        let atlas = strip_atlas_json(frame_count, frame_width, frame_height);
        self.with_documents(tile, &manifest, &atlas)
    }

    /// Serve a tile with explicit manifest and atlas documents.
    pub fn with_documents(self, tile: TileId, manifest: &str, atlas: &str) -> Self {
        let urls = TileUrls::new(BASE_URL).unwrap();
        {
            let mut documents = self.documents.lock().unwrap();
            documents.insert(
                urls.manifest_url(tile),
                Bytes::from(manifest.to_string()),
            );
            documents.insert(urls.atlas_url(tile), Bytes::from(atlas.to_string()));
        }
        self
    }

    /// Total number of fetches issued.
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of fetches whose URL ends with `suffix`.
    pub fn requests_for(&self, suffix: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|url| url.ends_with(suffix))
            .count()
    }

    /// Answer the next `n` fetches with HTTP 503.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    /// Delay every fetch by `delay`.
    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Make fetches never complete.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }
}

#[async_trait]
impl TileFetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());

        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let delay = *self.delay.lock().unwrap();
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: 503,
            });
        }

        self.documents
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(url.to_string()))
    }
}

// =============================================================================
// Mock Rasterizer
// =============================================================================

/// Rasterizer producing blank bitmaps of the requested size.
#[derive(Clone, Default)]
pub struct MockRasterizer {
    calls: Arc<Mutex<Vec<(TileId, f64)>>>,
    failures_left: Arc<AtomicUsize>,
    delay: Arc<Mutex<Option<Duration>>>,
    stalled: Arc<AtomicBool>,
}

impl MockRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Scales requested so far, in call order.
    pub fn scales(&self) -> Vec<f64> {
        self.calls.lock().unwrap().iter().map(|(_, s)| *s).collect()
    }

    /// Fail the next `n` rasterizations with a decode error.
    pub fn fail_next(&self, n: usize) {
        self.failures_left.store(n, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Make rasterizations never complete.
    pub fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }
}

#[async_trait]
impl Rasterizer for MockRasterizer {
    async fn rasterize(&self, source: &RasterSource, scale: f64) -> Result<RgbaImage, RasterError> {
        self.calls.lock().unwrap().push((source.tile, scale));

        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let delay = *self.delay.lock().unwrap();
        match delay {
            Some(delay) => tokio::time::sleep(delay).await,
            None => tokio::task::yield_now().await,
        }

        if self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(RasterError::Decode("mock decode failure".to_string()));
        }

        let (width, height) = source.target_size(scale);
        Ok(RgbaImage::new(width, height))
    }
}

// =============================================================================
// Test Harness
// =============================================================================

/// A loader wired to mocks, with handles on every collaborator.
pub struct Harness {
    pub loader: TileAtlasLoader<MockFetcher, MockRasterizer>,
    pub fetcher: MockFetcher,
    pub rasterizer: MockRasterizer,
    pub textures: Arc<LocalTextureRegistry>,
}

impl Harness {
    pub fn new(fetcher: MockFetcher, config: LoaderConfig) -> Self {
        let rasterizer = MockRasterizer::new();
        let textures = Arc::new(LocalTextureRegistry::new());
        let loader = TileAtlasLoader::new(
            fetcher.clone(),
            TileUrls::new(BASE_URL).unwrap(),
            rasterizer.clone(),
            textures.clone(),
            config,
        );
        Self {
            loader,
            fetcher,
            rasterizer,
            textures,
        }
    }

    /// Budget that fits exactly `frames` frames of `width x height` at scale 1.
    pub fn with_frame_budget(fetcher: MockFetcher, frames: usize, width: u32, height: u32) -> Self {
        let config = LoaderConfig {
            memory_budget: frames * (width * height * 4) as usize,
            ..LoaderConfig::default()
        };
        Self::new(fetcher, config)
    }
}
