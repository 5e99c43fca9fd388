//! End-to-end loader integration tests.
//!
//! Tests verify:
//! - A cold frame load fetches, rasterizes and slices exactly once
//! - Animation frames load concurrently, keep order and skip failures
//! - Prefetch warms metadata and base atlases without slicing frames
//! - Frame order and duplicate frames resolve from the atlas document

use tile_atlas::{LoaderConfig, TileBehavior, TileId};

use super::test_utils::{manifest_json, Harness, MockFetcher};

fn config_with_dpr(device_pixel_ratio: f64) -> LoaderConfig {
    LoaderConfig {
        device_pixel_ratio,
        ..LoaderConfig::default()
    }
}

// =============================================================================
// Single Frames
// =============================================================================

#[tokio::test]
async fn test_cold_load_then_cached() {
    let tile = TileId::ground(1);
    let fetcher = MockFetcher::new().with_strip_tile(tile, 4, 64, 64);
    let h = Harness::new(fetcher, config_with_dpr(2.0));

    let frame = h.loader.load_frame(tile, 0, 1.0).await.unwrap();

    // One fetch per document, one rasterization at the capped ratio
    assert_eq!(h.fetcher.requests_for("ground/1/manifest.json"), 1);
    assert_eq!(h.fetcher.requests_for("ground/1/atlas.json"), 1);
    assert_eq!(h.rasterizer.call_count(), 1);
    assert!((h.rasterizer.scales()[0] - 1.1).abs() < 1e-9);

    // 256x64 atlas rasterized to 282x70; frame 0 is clamped to the raster
    assert_eq!(frame.base.width(), 282);
    assert_eq!(frame.base.height(), 70);
    assert_eq!((frame.rect.x, frame.rect.y), (0, 0));
    assert_eq!(frame.rect.width, 71);
    assert_eq!(frame.rect.height, 70);
    assert!(h.textures.is_live(frame.handle));

    // Second identical call is a pure cache hit
    let again = h.loader.load_frame(tile, 0, 1.0).await.unwrap();
    assert!(std::sync::Arc::ptr_eq(&frame, &again));
    assert_eq!(h.fetcher.request_count(), 2);
    assert_eq!(h.rasterizer.call_count(), 1);
}

#[tokio::test]
async fn test_frames_share_one_base_atlas() {
    let tile = TileId::ground(1);
    let fetcher = MockFetcher::new().with_strip_tile(tile, 3, 32, 32);
    let h = Harness::new(fetcher, LoaderConfig::default());

    let a = h.loader.load_frame(tile, 0, 1.0).await.unwrap();
    let b = h.loader.load_frame(tile, 2, 1.0).await.unwrap();

    assert!(std::sync::Arc::ptr_eq(&a.base, &b.base));
    assert_eq!(b.rect.x, 64);
    assert_eq!(h.rasterizer.call_count(), 1);
    assert_eq!(h.loader.base_atlas_count(), 1);
    assert_eq!(h.loader.cache_entry_count().await, 2);
}

#[tokio::test]
async fn test_unknown_tile_is_none() {
    let h = Harness::new(MockFetcher::new(), LoaderConfig::default());

    assert!(h.loader.load_frame(TileId::objects(42), 0, 1.0).await.is_none());
    assert!(h.loader.get_metadata(TileId::objects(42)).await.is_none());
    assert_eq!(h.rasterizer.call_count(), 0);
    assert_eq!(h.loader.cache_entry_count().await, 0);
}

#[tokio::test]
async fn test_frame_index_out_of_range_is_none() {
    let tile = TileId::ground(1);
    let fetcher = MockFetcher::new().with_strip_tile(tile, 2, 32, 32);
    let h = Harness::new(fetcher, LoaderConfig::default());

    assert!(h.loader.load_frame(tile, 5, 1.0).await.is_none());
    // The base atlas was still rasterized and stays cached
    assert_eq!(h.loader.base_atlas_count(), 1);
    assert_eq!(h.loader.cache_entry_count().await, 0);
}

// =============================================================================
// Animation Frames
// =============================================================================

#[tokio::test]
async fn test_animation_frames_preserve_order() {
    let tile = TileId::ground(7);
    let fetcher = MockFetcher::new().with_strip_tile(tile, 6, 16, 16);
    let h = Harness::new(fetcher, LoaderConfig::default());

    let frames = h.loader.load_animation_frames(tile, 1.0).await;

    let indices: Vec<u32> = frames.iter().map(|f| f.key.frame).collect();
    assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    let xs: Vec<u32> = frames.iter().map(|f| f.rect.x).collect();
    assert_eq!(xs, vec![0, 16, 32, 48, 64, 80]);
    assert_eq!(h.rasterizer.call_count(), 1);
}

#[tokio::test]
async fn test_animation_skips_failed_frame() {
    let tile = TileId::objects(3);
    // Frame 2 lies outside the atlas and degenerates to an empty rectangle
    let atlas = r#"{ "width": 200, "height": 50, "frames": [
        { "id": "a", "x": 0, "y": 0, "width": 50, "height": 50 },
        { "id": "b", "x": 50, "y": 0, "width": 50, "height": 50 },
        { "id": "c", "x": 400, "y": 0, "width": 50, "height": 50 },
        { "id": "d", "x": 150, "y": 0, "width": 50, "height": 50 } ] }"#;
    let fetcher =
        MockFetcher::new().with_documents(tile, &manifest_json(tile, 4, 200, 50), atlas);
    let h = Harness::new(fetcher, LoaderConfig::default());

    let frames = h.loader.load_animation_frames(tile, 1.0).await;

    let indices: Vec<u32> = frames.iter().map(|f| f.key.frame).collect();
    assert_eq!(indices, vec![0, 1, 3]);
}

#[tokio::test]
async fn test_frame_order_and_duplicates() {
    let tile = TileId::ground(9);
    let atlas = r#"{ "width": 96, "height": 32,
        "frames": [
            { "id": "a", "x": 0, "y": 0, "width": 32, "height": 32, "offsetX": 1.5 },
            { "id": "b", "x": 32, "y": 0, "width": 32, "height": 32 },
            { "id": "c", "x": 64, "y": 0, "width": 32, "height": 32 } ],
        "frameOrder": ["c", "a", "a-again", "b"],
        "duplicates": { "a-again": "a" } }"#;
    let fetcher = MockFetcher::new().with_documents(tile, &manifest_json(tile, 4, 96, 32), atlas);
    let h = Harness::new(fetcher, LoaderConfig::default());

    let frames = h.loader.load_animation_frames(tile, 1.0).await;
    let xs: Vec<u32> = frames.iter().map(|f| f.rect.x).collect();
    assert_eq!(xs, vec![64, 0, 0, 32]);

    // The duplicate is a separate cache entry over the same pixels
    assert_eq!(frames[1].rect, frames[2].rect);
    assert_eq!(frames[2].trim_offset, (1.5, 0.0));
    assert_ne!(frames[1].handle, frames[2].handle);
}

// =============================================================================
// Metadata and Prefetch
// =============================================================================

#[tokio::test]
async fn test_get_metadata() {
    let tile = TileId::ground(245);
    let fetcher = MockFetcher::new().with_strip_tile(tile, 4, 64, 48);
    let h = Harness::new(fetcher, LoaderConfig::default());

    assert!(h.loader.get_metadata_sync(tile).is_none());

    let metadata = h.loader.get_metadata(tile).await.unwrap();
    assert_eq!(metadata.sprite_id, "ground_245");
    assert_eq!(metadata.frame_count, 4);
    assert_eq!((metadata.width, metadata.height), (256, 48));
    assert_eq!(metadata.behavior, TileBehavior::Animated);
    assert_eq!(metadata.fps, Some(8.0));
    assert_eq!(
        metadata.source_url,
        "mock://assets/tiles/ground/245/atlas.svg"
    );

    let cached = h.loader.get_metadata_sync(tile).unwrap();
    assert_eq!(cached, metadata);
    assert_eq!(h.loader.metadata_count(), 1);
}

#[tokio::test]
async fn test_prefetch_warms_bases_only() {
    let (a, b, missing) = (TileId::ground(1), TileId::ground(2), TileId::objects(9));
    let fetcher = MockFetcher::new()
        .with_strip_tile(a, 2, 32, 32)
        .with_strip_tile(b, 3, 32, 32);
    let h = Harness::new(fetcher, LoaderConfig::default());

    let ready = h.loader.prefetch(&[a, b, missing], 1.5).await;

    assert_eq!(ready, 2);
    assert_eq!(h.loader.base_atlas_count(), 2);
    assert_eq!(h.loader.cache_entry_count().await, 0);
    assert!(h.loader.get_metadata_sync(a).is_some());
    assert!(h.loader.get_metadata_sync(b).is_some());
    assert!(h.loader.get_metadata_sync(missing).is_none());
    assert!(h.loader.get_base_atlas_sync(a, 1.5).is_some());

    // Frames sliced after prefetch need no further I/O
    let requests = h.fetcher.request_count();
    let frames = h.loader.load_animation_frames(b, 1.5).await;
    assert_eq!(frames.len(), 3);
    assert_eq!(h.fetcher.request_count(), requests);
    assert_eq!(h.rasterizer.call_count(), 2);
}

#[tokio::test]
async fn test_oversized_tile_is_clamped_not_failed() {
    let tile = TileId::objects(1);
    let fetcher = MockFetcher::new().with_strip_tile(tile, 10, 800, 400);
    let h = Harness::new(fetcher, config_with_dpr(1.0));

    // 8000px wide at zoom 2 would be 16000px; clamped to 4096
    let frame = h.loader.load_frame(tile, 9, 2.0).await.unwrap();
    assert_eq!(frame.base.width(), 4096);
    assert!(frame.rect.x + frame.rect.width <= 4096);
    assert!(frame.rect.y + frame.rect.height <= frame.base.height());
}
