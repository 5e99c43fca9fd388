//! Tile Atlas - warm the tile atlas cache from the command line.
//!
//! Prefetches the given tiles, optionally slices every animation frame, and
//! logs what the cache ended up holding.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tile_atlas::{
    Config, HttpFetcher, ImageRasterizer, LocalTextureRegistry, TileAtlasLoader, TileId,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    // validate() has already parsed both
    let (urls, tiles) = match (config.tile_urls(), config.tile_ids()) {
        (Ok(urls), Ok(tiles)) => (urls, tiles),
        (Err(e), _) | (_, Err(e)) => {
            error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let loader_config = config.loader_config();

    info!("Configuration:");
    info!("  Base URL: {}", urls.base());
    info!("  Zoom: {}", config.zoom);
    info!(
        "  Frame budget: {}MB, {} entries",
        loader_config.memory_budget / (1024 * 1024),
        loader_config.max_entries
    );
    info!(
        "  Device pixel ratio: {}, texture limit: {}px",
        loader_config.device_pixel_ratio, loader_config.texture_size_limit
    );
    match loader_config.load_timeout {
        Some(timeout) => info!("  Load timeout: {:?}", timeout),
        None => warn!("  Load timeout: DISABLED - stalled loads block their key"),
    }

    let fetcher = HttpFetcher::new();
    let textures = Arc::new(LocalTextureRegistry::new());
    let loader = TileAtlasLoader::new(
        fetcher.clone(),
        urls,
        ImageRasterizer::new(fetcher),
        textures.clone(),
        loader_config,
    );

    info!("");
    info!("Prefetching {} tile(s)...", tiles.len());
    let ready = loader.prefetch(&tiles, config.zoom).await;
    info!("  {} of {} ready", ready, tiles.len());

    if config.frames {
        load_frames(&loader, &tiles, config.zoom).await;
    }

    let stats = loader.cache_stats().await;
    info!("");
    info!("Cache:");
    info!("  Metadata: {} tile(s)", stats.metadata_entries);
    info!(
        "  Base atlases: {} ({} KB)",
        stats.base_atlases,
        stats.base_atlas_bytes / 1024
    );
    info!(
        "  Frames: {} ({} KB of {} KB)",
        stats.frame_entries,
        stats.frame_bytes / 1024,
        stats.memory_budget / 1024
    );
    info!("  Evicted but held: {}", stats.retired_frames);
    info!("  Live textures: {}", textures.live_count());

    loader.clear_all().await;

    if ready == tiles.len() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Slice every frame of each tile and log the outcome.
async fn load_frames<F, R>(loader: &TileAtlasLoader<F, R>, tiles: &[TileId], zoom: f64)
where
    F: tile_atlas::TileFetcher,
    R: tile_atlas::Rasterizer,
{
    info!("");
    info!("Loading frames...");
    for &tile in tiles {
        let Some(metadata) = loader.get_metadata_sync(tile) else {
            continue;
        };
        let frames = loader.load_animation_frames(tile, zoom).await;
        info!(
            "  {}: {} of {} frame(s) ({:?})",
            tile,
            frames.len(),
            metadata.frame_count,
            metadata.behavior
        );
    }
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "tile_atlas=debug"
    } else {
        "tile_atlas=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
