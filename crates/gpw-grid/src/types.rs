//! Core types: tile geometry, global coordinates and geo-referencing.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};

/// Identifier of one physical tile file (1-based, row-major in the layout).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TileId(u16);

impl TileId {
    /// Create a tile id. Ids start at 1.
    pub fn new(id: u16) -> Result<Self> {
        if id == 0 {
            return Err(GridError::format("tile ids start at 1"));
        }
        Ok(Self(id))
    }

    /// Get the raw id.
    pub fn get(self) -> u16 {
        self.0
    }

    /// Zero-based position of this tile in the layout.
    fn ordinal(self) -> usize {
        self.0 as usize - 1
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TileId {
    type Err = GridError;

    fn from_str(s: &str) -> Result<Self> {
        let id: u16 = s
            .parse()
            .map_err(|_| GridError::format(format!("invalid tile id '{}'", s)))?;
        Self::new(id)
    }
}

/// Geometry of the global tile mosaic.
///
/// The world raster is cut into `tiles_per_row × tile_rows` square tiles of
/// `tile_size` cells. Tile 1 is the north-west corner, ids increase eastwards
/// and then southwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileLayout {
    /// Rows and columns per tile.
    pub tile_size: usize,
    /// Number of tiles along the longitude axis.
    pub tiles_per_row: usize,
    /// Number of tile bands along the latitude axis.
    pub tile_rows: usize,
    /// Country-identifier value used for cells that belong to no country.
    pub no_country_value: i32,
    /// Longitude of the western edge of the global grid.
    pub origin_lon: f64,
    /// Latitude of the northern edge of the global grid.
    pub origin_lat: f64,
    /// Raw rows end with a single separator before the newline.
    pub trailing_separator: bool,
}

impl TileLayout {
    /// The SEDAC GPW v4 30 arc-second layout: 8 tiles of 10800 × 10800.
    pub fn gpw() -> Self {
        Self {
            tile_size: 10800,
            tiles_per_row: 4,
            tile_rows: 2,
            no_country_value: -32768,
            origin_lon: -180.0,
            origin_lat: 90.0,
            trailing_separator: true,
        }
    }

    /// A small synthetic layout with the same 4 × 2 arrangement.
    pub fn synthetic(tile_size: usize) -> Self {
        Self {
            tile_size,
            trailing_separator: false,
            ..Self::gpw()
        }
    }

    /// Total number of tiles.
    pub fn tile_count(&self) -> usize {
        self.tiles_per_row * self.tile_rows
    }

    /// All tile ids in ascending order.
    pub fn tile_ids(&self) -> impl Iterator<Item = TileId> {
        (1..=self.tile_count() as u16).map(TileId)
    }

    /// Whether the tile id exists in this layout.
    pub fn contains(&self, tile: TileId) -> bool {
        tile.ordinal() < self.tile_count()
    }

    /// Global column of the tile's first column.
    pub fn x_offset(&self, tile: TileId) -> usize {
        self.tile_size * (tile.ordinal() % self.tiles_per_row)
    }

    /// Global row of the tile's first row.
    pub fn y_offset(&self, tile: TileId) -> usize {
        self.tile_size * (tile.ordinal() / self.tiles_per_row)
    }

    /// Convert a tile-local cell to global coordinates.
    pub fn to_global(&self, tile: TileId, row: usize, col: usize) -> GlobalCoord {
        GlobalCoord {
            row: self.y_offset(tile) + row,
            col: self.x_offset(tile) + col,
        }
    }

    /// Global raster size as (rows, cols).
    pub fn global_shape(&self) -> (usize, usize) {
        (
            self.tile_size * self.tile_rows,
            self.tile_size * self.tiles_per_row,
        )
    }

    /// Validate the layout.
    pub fn validate(&self) -> Result<()> {
        if self.tile_size == 0 {
            return Err(GridError::config("tile_size must be > 0"));
        }
        if self.tiles_per_row == 0 || self.tile_rows == 0 {
            return Err(GridError::config("layout needs at least one tile"));
        }
        if self.tile_count() > u16::MAX as usize {
            return Err(GridError::config("too many tiles in layout"));
        }
        Ok(())
    }
}

impl Default for TileLayout {
    fn default() -> Self {
        Self::gpw()
    }
}

/// A cell in the conceptual world raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalCoord {
    pub row: usize,
    pub col: usize,
}

/// Inclusive bounding box in global cell coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellBounds {
    pub min_row: usize,
    pub max_row: usize,
    pub min_col: usize,
    pub max_col: usize,
}

impl CellBounds {
    /// Bounds containing a single cell.
    pub fn from_coord(coord: GlobalCoord) -> Self {
        Self {
            min_row: coord.row,
            max_row: coord.row,
            min_col: coord.col,
            max_col: coord.col,
        }
    }

    /// Grow the bounds to include a cell.
    pub fn include(&mut self, coord: GlobalCoord) {
        self.min_row = self.min_row.min(coord.row);
        self.max_row = self.max_row.max(coord.row);
        self.min_col = self.min_col.min(coord.col);
        self.max_col = self.max_col.max(coord.col);
    }

    /// Number of columns covered.
    pub fn width(&self) -> usize {
        self.max_col - self.min_col + 1
    }

    /// Number of rows covered.
    pub fn height(&self) -> usize {
        self.max_row - self.min_row + 1
    }
}

/// Geo-referencing of a cropped raster.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoReference {
    /// Longitude of the lower-left corner of the lower-left cell.
    pub llcrnrlon: f64,
    /// Latitude of the lower-left corner of the lower-left cell.
    pub llcrnrlat: f64,
    /// Cell size in degrees (both axes).
    pub cellsize: f64,
}

impl GeoReference {
    /// Geo-reference of the box `bounds` inside a global grid whose
    /// north-west corner is at (`origin_lon`, `origin_lat`).
    pub fn for_bounds(layout: &TileLayout, bounds: &CellBounds, cellsize: f64) -> Self {
        Self {
            llcrnrlon: layout.origin_lon + bounds.min_col as f64 * cellsize,
            llcrnrlat: layout.origin_lat - (bounds.max_row + 1) as f64 * cellsize,
            cellsize,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(id: u16) -> TileId {
        TileId::new(id).unwrap()
    }

    #[test]
    fn test_gpw_offsets() {
        let layout = TileLayout::gpw();
        let xs: Vec<usize> = layout.tile_ids().map(|t| layout.x_offset(t)).collect();
        let ys: Vec<usize> = layout.tile_ids().map(|t| layout.y_offset(t)).collect();

        assert_eq!(
            xs,
            vec![0, 10800, 21600, 32400, 0, 10800, 21600, 32400]
        );
        assert_eq!(ys, vec![0, 0, 0, 0, 10800, 10800, 10800, 10800]);
        assert_eq!(layout.global_shape(), (21600, 43200));
    }

    #[test]
    fn test_synthetic_layout_offsets() {
        let layout = TileLayout::synthetic(4);
        assert_eq!(layout.x_offset(tile(3)), 8);
        assert_eq!(layout.y_offset(tile(7)), 4);
        assert_eq!(
            layout.to_global(tile(6), 1, 2),
            GlobalCoord { row: 5, col: 6 }
        );
    }

    #[test]
    fn test_tile_id_parse() {
        assert_eq!("3".parse::<TileId>().unwrap(), tile(3));
        assert!("0".parse::<TileId>().is_err());
        assert!("x".parse::<TileId>().is_err());
        assert!(TileLayout::gpw().contains(tile(8)));
        assert!(!TileLayout::gpw().contains(tile(9)));
    }

    #[test]
    fn test_bounds_include() {
        let mut bounds = CellBounds::from_coord(GlobalCoord { row: 5, col: 5 });
        bounds.include(GlobalCoord { row: 2, col: 9 });
        assert_eq!(bounds.height(), 4);
        assert_eq!(bounds.width(), 5);
    }

    #[test]
    fn test_geo_reference_lower_left() {
        let layout = TileLayout::gpw();
        let bounds = CellBounds {
            min_row: 0,
            max_row: 119,
            min_col: 120,
            max_col: 239,
        };
        let geo = GeoReference::for_bounds(&layout, &bounds, 1.0 / 120.0);
        assert!((geo.llcrnrlon - (-179.0)).abs() < 1e-9);
        assert!((geo.llcrnrlat - 89.0).abs() < 1e-9);
    }

    #[test]
    fn test_layout_validation() {
        assert!(TileLayout::gpw().validate().is_ok());
        let mut layout = TileLayout::gpw();
        layout.tile_size = 0;
        assert!(layout.validate().is_err());
    }
}
