mod fetch;
mod ledger;

use std::future::Future;
use std::time::Duration;

pub use fetch::{fetch_json, HttpFetcher, TileFetcher, TileUrls};
pub use ledger::RequestLedger;

use crate::error::LoadError;

/// Bound `fut` by `timeout`, mapping expiry to [`LoadError::Timeout`].
///
/// With no timeout the future runs to completion.
pub(crate) async fn with_timeout<T, E, Fut>(
    timeout: Option<Duration>,
    operation: &'static str,
    fut: Fut,
) -> Result<T, LoadError>
where
    Fut: Future<Output = Result<T, E>>,
    E: Into<LoadError>,
{
    match timeout {
        Some(after) => match tokio::time::timeout(after, fut).await {
            Ok(result) => result.map_err(Into::into),
            Err(_) => Err(LoadError::Timeout { operation, after }),
        },
        None => fut.await.map_err(Into::into),
    }
}
