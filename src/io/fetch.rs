use async_trait::async_trait;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use url::Url;

use crate::error::FetchError;
use crate::tile::TileId;

/// Trait for retrieving tile documents and source images by URL.
///
/// Implementations must fail with [`FetchError::NotFound`] or
/// [`FetchError::Status`] on a non-success status rather than returning
/// the error body.
#[async_trait]
pub trait TileFetcher: Send + Sync {
    /// Fetch the full body at `url`.
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError>;
}

/// Fetch `url` and parse the body as JSON.
pub async fn fetch_json<T, F>(fetcher: &F, url: &str) -> Result<T, FetchError>
where
    T: DeserializeOwned,
    F: TileFetcher + ?Sized,
{
    let body = fetcher.fetch(url).await?;
    serde_json::from_slice(&body).map_err(|e| FetchError::Parse {
        url: url.to_string(),
        message: e.to_string(),
    })
}

// =============================================================================
// Tile URLs
// =============================================================================

/// Addressing scheme for tile documents.
///
/// Every tile lives under `{base}/tiles/{kind}/{id}/`, next to its
/// `manifest.json` and `atlas.json`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileUrls {
    base: Url,
}

impl TileUrls {
    /// Create the addressing scheme rooted at `base`.
    ///
    /// A trailing slash is added when missing so relative joins stay under
    /// the base path.
    pub fn new(base: &str) -> Result<Self, url::ParseError> {
        let mut base = Url::parse(base)?;
        if base.cannot_be_a_base() {
            return Err(url::ParseError::RelativeUrlWithCannotBeABaseBase);
        }
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Ok(Self { base })
    }

    pub fn base(&self) -> &str {
        self.base.as_str()
    }

    /// Directory holding every document of a tile (ends with `/`).
    pub fn tile_dir(&self, tile: TileId) -> String {
        format!("{}tiles/{}/{}/", self.base, tile.kind, tile.id)
    }

    pub fn manifest_url(&self, tile: TileId) -> String {
        format!("{}manifest.json", self.tile_dir(tile))
    }

    pub fn atlas_url(&self, tile: TileId) -> String {
        format!("{}atlas.json", self.tile_dir(tile))
    }

    /// Resolve a manifest-relative source file against the tile directory.
    pub fn source_url(&self, tile: TileId, file: &str) -> String {
        let dir = self.tile_dir(tile);
        Url::parse(&dir)
            .and_then(|dir| dir.join(file))
            .map(String::from)
            .unwrap_or_else(|_| format!("{}{}", dir, file))
    }
}

// =============================================================================
// HTTP Fetcher
// =============================================================================

/// HTTP implementation of [`TileFetcher`] backed by reqwest.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a preconfigured client (proxies, default headers, timeouts).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TileFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Bytes, FetchError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Connection(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| FetchError::Connection(e.to_string()))
    }
}
