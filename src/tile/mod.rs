//! Tile identity and metadata.
//!
//! # Components
//!
//! - [`TileId`]: tile kind plus numeric id, serialized as `{kind}_{id}`
//! - [`TileMetadata`]: manifest and atlas layout merged into one record
//! - [`MetadataStore`]: fetches and caches metadata, one fetch pair per tile

mod id;
mod metadata;
mod store;

pub use id::{TileId, TileKind};
pub use metadata::{
    AtlasFrame, AtlasLayout, FrameDescriptor, ManifestAnimation, TileBehavior, TileManifest,
    TileMetadata,
};
pub use store::MetadataStore;
