//! Image service client: tile and metadata retrieval for one endpoint.

use super::info::ImageInfo;
use super::types::{InfoError, TileError};
use crate::client::HttpClient;
use crate::grid::TileSpec;
use image::{ImageReader, RgbImage};
use std::io::Cursor;
use std::sync::Arc;
use tracing::trace;

/// Client for a single IIIF image service endpoint.
///
/// Builds region requests against the fixed Image API path structure
/// `{base}/{x},{y},{w},{h}/{w},/0/default{ext}`: absolute pixel region,
/// size scaled to the region's own width (native resolution), no rotation,
/// default quality.
pub struct ImageService<C: HttpClient> {
    client: Arc<C>,
    base_url: String,
}

impl<C: HttpClient> ImageService<C> {
    /// Creates a service client for the given tile service base URL.
    ///
    /// A trailing slash on `base_url` is tolerated and stripped.
    pub fn new(client: Arc<C>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    /// Returns the service base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Constructs the request URL for one tile region.
    fn tile_url(&self, spec: &TileSpec, extension: &str) -> String {
        format!(
            "{base}/{x},{y},{w},{h}/{w},/0/default{ext}",
            base = self.base_url,
            x = spec.x,
            y = spec.y,
            w = spec.width,
            h = spec.height,
            ext = extension,
        )
    }

    /// Fetches one tile region at native resolution and decodes it.
    ///
    /// Performs exactly one GET; retry policy lives in the caller.
    ///
    /// # Arguments
    ///
    /// * `spec` - The region to request, in page-pixel coordinates
    /// * `extension` - Output format extension, e.g. `.jpg`
    ///
    /// # Returns
    ///
    /// The decoded pixel buffer, or [`TileError::Fetch`] when the request
    /// fails and [`TileError::Decode`] when the body is not a decodable
    /// image.
    pub async fn fetch_tile(&self, spec: &TileSpec, extension: &str) -> Result<RgbImage, TileError> {
        let url = self.tile_url(spec, extension);
        trace!(url = %url, "fetching tile region");

        let bytes = self.client.get(&url).await?;

        let image = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| TileError::Decode(format!("format detection failed: {}", e)))?
            .decode()
            .map_err(|e| TileError::Decode(e.to_string()))?;

        Ok(image.to_rgb8())
    }

    /// Fetches and parses the service's `info.json` document.
    pub async fn fetch_info(&self) -> Result<ImageInfo, InfoError> {
        let url = format!("{}/info.json", self.base_url);
        trace!(url = %url, "fetching image information");

        let bytes = self.client.get(&url).await?;
        serde_json::from_slice(&bytes).map_err(|e| InfoError::Parse(e.to_string()))
    }
}
