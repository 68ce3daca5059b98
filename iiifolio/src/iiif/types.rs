//! Image service error types.

use crate::client::HttpError;
use thiserror::Error;

/// Errors from fetching and decoding a single tile.
///
/// Tile errors are non-fatal at page granularity: the compositor logs the
/// failure and leaves the region blank rather than aborting the page.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// The transport failed or the server answered with an error status.
    #[error("tile fetch failed: {0}")]
    Fetch(#[from] HttpError),

    /// The response body could not be decoded as an image.
    #[error("tile decode failed: {0}")]
    Decode(String),
}

/// Errors from fetching or parsing an image service's `info.json`.
#[derive(Debug, Clone, Error)]
pub enum InfoError {
    /// The transport failed or the server answered with an error status.
    #[error("info.json fetch failed: {0}")]
    Fetch(#[from] HttpError),

    /// The response body was not a valid info.json document.
    #[error("info.json parse failed: {0}")]
    Parse(String),
}
