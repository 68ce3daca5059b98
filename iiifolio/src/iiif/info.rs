//! Image Information (`info.json`) document model.

use serde::Deserialize;

/// The subset of an Image API `info.json` document the engine consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageInfo {
    /// Full width of the image in pixels.
    pub width: u32,
    /// Full height of the image in pixels.
    pub height: u32,
    /// Tile descriptions, most-preferred first. Absent on servers that only
    /// serve whole images.
    #[serde(default)]
    pub tiles: Vec<TileDescription>,
}

/// One entry of the `tiles` array.
///
/// The Image API allows `height` to be omitted, in which case tiles are
/// square.
#[derive(Debug, Clone, Deserialize)]
pub struct TileDescription {
    pub width: u32,
    pub height: Option<u32>,
}

/// The tile unit used to plan a page's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileUnit {
    pub width: u32,
    pub height: u32,
}

impl ImageInfo {
    /// Returns the tile unit from the first `tiles` entry, if the service
    /// advertises tiling at all.
    pub fn tile_unit(&self) -> Option<TileUnit> {
        self.tiles.first().map(|t| TileUnit {
            width: t.width,
            height: t.height.unwrap_or(t.width),
        })
    }
}
