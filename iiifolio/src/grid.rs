//! Tile grid planning.
//!
//! A page larger than the server's tile unit must be requested as a grid of
//! independently addressable regions. [`plan`] computes that grid: full-size
//! interior tiles plus the ragged right edge, bottom edge, and bottom-right
//! corner that remain when the page dimensions are not exact multiples of
//! the tile unit.

/// One rectangular region of a page, in page-pixel coordinates.
///
/// Invariant: `x + width <= page width` and `y + height <= page height`
/// for the page the spec was planned against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileSpec {
    /// Left edge of the region.
    pub x: u32,
    /// Top edge of the region.
    pub y: u32,
    /// Region width in pixels (always positive).
    pub width: u32,
    /// Region height in pixels (always positive).
    pub height: u32,
}

impl TileSpec {
    /// Create a new tile spec.
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Computes the set of tile regions that exactly cover a page.
///
/// Emits a full-size spec for every interior (row, column) position, then a
/// right-edge spec per row when the page width is not a multiple of the tile
/// width, a bottom-edge row when the height is ragged, and a single corner
/// spec when both are. The union of the returned specs covers the page
/// rectangle with no overlap and no gap.
///
/// When the tile unit is at least as large as the page in both dimensions,
/// exactly one spec covering the whole page is returned.
///
/// # Arguments
///
/// * `page_width` - Page width in pixels (must be positive)
/// * `page_height` - Page height in pixels (must be positive)
/// * `tile_width` - Tile unit width in pixels (must be positive)
/// * `tile_height` - Tile unit height in pixels (must be positive)
pub fn plan(page_width: u32, page_height: u32, tile_width: u32, tile_height: u32) -> Vec<TileSpec> {
    debug_assert!(page_width > 0 && page_height > 0);
    debug_assert!(tile_width > 0 && tile_height > 0);

    let columns = page_width / tile_width;
    let rows = page_height / tile_height;
    let width_rem = page_width % tile_width;
    let height_rem = page_height % tile_height;

    let mut specs =
        Vec::with_capacity(((rows + 1) as usize).saturating_mul((columns + 1) as usize));

    for row in 0..rows {
        for column in 0..columns {
            specs.push(TileSpec::new(
                column * tile_width,
                row * tile_height,
                tile_width,
                tile_height,
            ));
        }

        // Ragged right edge
        if width_rem > 0 {
            specs.push(TileSpec::new(
                columns * tile_width,
                row * tile_height,
                width_rem,
                tile_height,
            ));
        }
    }

    // Ragged bottom edge
    if height_rem > 0 {
        for column in 0..columns {
            specs.push(TileSpec::new(
                column * tile_width,
                rows * tile_height,
                tile_width,
                height_rem,
            ));
        }

        // Bottom-right corner, ragged in both dimensions
        if width_rem > 0 {
            specs.push(TileSpec::new(
                columns * tile_width,
                rows * tile_height,
                width_rem,
                height_rem,
            ));
        }
    }

    specs
}
