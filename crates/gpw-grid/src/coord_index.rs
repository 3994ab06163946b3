//! Per-country index of cell positions inside each tile.
//!
//! For one country this records, per tile and per tile-local row, the columns
//! whose identifier equals the country. Only rows with at least one match are
//! kept. The persisted form is one line per `(tile, row)`, with the columns
//! range-encoded:
//!
//! ```text
//! #file_id, line_number, column_numbers
//! 1 2206 77,101
//! 1 2207 72,106 108,112 114,119
//! 4 5710 4876,4892
//! ```
//!
//! Indices are tile-local; [`TileLayout::to_global`] applies the offsets.

use std::collections::BTreeMap;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::codec::range;
use crate::error::{GridError, Result};
use crate::source::{Dataset, TileSource};
use crate::store::Persist;
use crate::types::{TileId, TileLayout};

/// Header line of the persisted coordinate index.
pub const COORD_INDEX_HEADER: &str = "#file_id, line_number, column_numbers";

/// Tile-local row → strictly increasing column list.
pub type TileRows = BTreeMap<usize, Vec<usize>>;

/// Cell positions of one country across its tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryCoordinateIndex {
    country_id: i32,
    tile_ids: Vec<TileId>,
    tiles: BTreeMap<TileId, TileRows>,
}

impl CountryCoordinateIndex {
    /// Create an empty index for a country recorded in `tile_ids`.
    pub fn new(country_id: i32, tile_ids: &[TileId]) -> Self {
        let mut tile_ids = tile_ids.to_vec();
        tile_ids.sort_unstable();
        tile_ids.dedup();
        let tiles = tile_ids.iter().map(|&t| (t, TileRows::new())).collect();
        Self {
            country_id,
            tile_ids,
            tiles,
        }
    }

    /// Scan the country-identifier tiles of `tile_ids` for `country_id`.
    pub fn build<S>(
        source: &S,
        layout: &TileLayout,
        country_id: i32,
        tile_ids: &[TileId],
        parallel: bool,
    ) -> Result<Self>
    where
        S: TileSource + ?Sized,
    {
        let mut index = Self::new(country_id, tile_ids);
        if let Some(tile) = index.tile_ids.iter().find(|t| !layout.contains(**t)) {
            return Err(GridError::inconsistent(format!(
                "country {} is recorded in tile {} which is not part of the layout",
                country_id, tile
            )));
        }

        info!(country = country_id, tiles = index.tile_ids.len(), parallel, "Building coordinate index");

        let scan = |tile: TileId| -> Result<(TileId, TileRows)> {
            Ok((tile, scan_tile(source, layout, country_id, tile)?))
        };
        let scanned: Vec<(TileId, TileRows)> = if parallel {
            index.tile_ids.par_iter().map(|&t| scan(t)).collect::<Result<_>>()?
        } else {
            index.tile_ids.iter().map(|&t| scan(t)).collect::<Result<_>>()?
        };

        for (tile, rows) in scanned {
            index.tiles.insert(tile, rows);
        }

        info!(
            country = country_id,
            rows = index.row_count(),
            cells = index.cell_count(),
            "Coordinate index built"
        );
        Ok(index)
    }

    /// Record the matching columns of one row.
    ///
    /// Columns must be non-empty and strictly increasing, the tile must be one
    /// of the country's recorded tiles and the row must not be present yet.
    pub fn insert_row(&mut self, tile: TileId, row: usize, cols: Vec<usize>) -> Result<()> {
        if cols.is_empty() || cols.windows(2).any(|w| w[0] >= w[1]) {
            return Err(GridError::format(format!(
                "tile {} row {}: columns must be non-empty and strictly increasing",
                tile, row
            )));
        }
        let country_id = self.country_id;
        let rows = self.tiles.get_mut(&tile).ok_or_else(|| {
            GridError::inconsistent(format!(
                "tile {} is not among the recorded tiles of country {}",
                tile, country_id
            ))
        })?;
        if rows.insert(row, cols).is_some() {
            return Err(GridError::format(format!("tile {} row {} listed twice", tile, row)));
        }
        Ok(())
    }

    pub fn country_id(&self) -> i32 {
        self.country_id
    }

    /// Tiles the country is recorded in (from the tile index).
    pub fn tile_ids(&self) -> &[TileId] {
        &self.tile_ids
    }

    /// Rows of one tile, if the tile is recorded.
    pub fn rows(&self, tile: TileId) -> Option<&TileRows> {
        self.tiles.get(&tile)
    }

    /// Iterate over recorded tiles with their rows, in tile order.
    pub fn iter(&self) -> impl Iterator<Item = (TileId, &TileRows)> {
        self.tiles.iter().map(|(t, r)| (*t, r))
    }

    /// Number of `(tile, row)` pairs with matches.
    pub fn row_count(&self) -> usize {
        self.tiles.values().map(BTreeMap::len).sum()
    }

    /// Number of cells belonging to the country.
    pub fn cell_count(&self) -> usize {
        self.tiles
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    /// Whether no cell was found.
    pub fn is_empty(&self) -> bool {
        self.tiles.values().all(BTreeMap::is_empty)
    }

    /// Parse a persisted coordinate index for a country recorded in
    /// `tile_ids`.
    pub fn decode(text: &str, country_id: i32, tile_ids: &[TileId]) -> Result<Self> {
        let mut index = Self::new(country_id, tile_ids);
        let mut lines = text.lines();
        match lines.next() {
            Some(header) if header.starts_with('#') => {}
            _ => return Err(GridError::format("coordinate index lacks its header line")),
        }

        for (n, line) in lines.enumerate() {
            let line_no = n + 2;
            let mut parts = line.split(' ');
            let tile = parts
                .next()
                .unwrap_or_default()
                .parse::<TileId>()
                .map_err(|e| e.context(format_args!("coordinate index line {}", line_no)))?;
            let row: usize = parts
                .next()
                .and_then(|r| r.parse().ok())
                .ok_or_else(|| {
                    GridError::format(format!("coordinate index line {}: missing row", line_no))
                })?;

            let cols = range::decompress_tokens(parts)
                .map_err(|e| e.context(format_args!("coordinate index line {}", line_no)))?;
            if cols.is_empty() {
                return Err(GridError::format(format!(
                    "coordinate index line {}: no column ranges",
                    line_no
                )));
            }

            index
                .insert_row(tile, row, cols)
                .map_err(|e| e.context(format_args!("coordinate index line {}", line_no)))?;
        }

        Ok(index)
    }
}

impl Persist for CountryCoordinateIndex {
    fn encode(&self) -> String {
        let mut out = String::new();
        out.push_str(COORD_INDEX_HEADER);
        out.push('\n');
        for (tile, rows) in &self.tiles {
            for (row, cols) in rows {
                out.push_str(&format!("{} {} {}\n", tile, row, range::compress(cols)));
            }
        }
        out
    }
}

/// Collect the matching columns of every row of one tile.
fn scan_tile<S>(source: &S, layout: &TileLayout, country_id: i32, tile: TileId) -> Result<TileRows>
where
    S: TileSource + ?Sized,
{
    let needle = country_id.to_string();
    let mut reader = source.open_tile(Dataset::CountryIds, tile, layout)?;
    let mut rows = TileRows::new();

    for row_id in 0..reader.header().nrows {
        let row = reader.read_row()?;
        if !row.contains(needle.as_str()) {
            continue;
        }
        let cols: Vec<usize> = row
            .split(' ')
            .enumerate()
            .filter(|(_, token)| *token == needle)
            .map(|(col, _)| col)
            .collect();
        if !cols.is_empty() {
            rows.insert(row_id, cols);
        }
    }
    reader.finish()?;

    debug!(tile = %tile, country = country_id, rows = rows.len(), "Scanned tile for country");
    Ok(rows)
}
