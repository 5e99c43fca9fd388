//! Tile identity.
//!
//! A tile is addressed by its kind and a numeric id. The composite string
//! form `{kind}_{id}` (e.g. `ground_245`) is used both as the cache-key
//! prefix and as the path segment pair for fetching tile documents.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseTileIdError;

/// The two tile families a map is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TileKind {
    Ground,
    Objects,
}

impl TileKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TileKind::Ground => "ground",
            TileKind::Objects => "objects",
        }
    }
}

impl fmt::Display for TileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a visual asset, independent of how it will be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId {
    pub kind: TileKind,
    pub id: u32,
}

impl TileId {
    pub fn new(kind: TileKind, id: u32) -> Self {
        Self { kind, id }
    }

    pub fn ground(id: u32) -> Self {
        Self::new(TileKind::Ground, id)
    }

    pub fn objects(id: u32) -> Self {
        Self::new(TileKind::Objects, id)
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.kind, self.id)
    }
}

impl FromStr for TileId {
    type Err = ParseTileIdError;

    fn from_str(key: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| ParseTileIdError {
            key: key.to_string(),
            reason,
        };

        let (kind, id) = key
            .rsplit_once('_')
            .ok_or_else(|| invalid("expected '{kind}_{id}'"))?;

        let kind = match kind {
            "ground" => TileKind::Ground,
            "objects" => TileKind::Objects,
            _ => return Err(invalid("kind must be 'ground' or 'objects'")),
        };

        let id = id
            .parse::<u32>()
            .map_err(|_| invalid("id must be a non-negative integer"))?;

        Ok(TileId::new(kind, id))
    }
}
