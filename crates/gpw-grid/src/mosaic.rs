//! Country-cropped rasters and their assembly from raw tiles.
//!
//! A [`Mosaic`] is the attribute raster (population count) of one country,
//! cropped to the tightest box around the country's cells. Every cell is one
//! of three states: a value, no data inside the country, or outside the
//! country.
//!
//! The persisted form has seven header lines followed by one run-length
//! encoded line per row:
//!
//! ```text
//! ncols 880
//! nrows 1780
//! llcrnrlon 102.14166666666557
//! llcrnrlat 8.56666666666699
//! cellsize 0.0083333333333333
//! NOTINCOUNTRY_value -2
//! NODATA_value -1
//! 381x-2.0 1x125.026 498x-2.0
//! ```

use rayon::prelude::*;
use tracing::{debug, info};

use crate::codec::run_length;
use crate::coord_index::{CountryCoordinateIndex, TileRows};
use crate::error::{GridError, Result};
use crate::source::{Dataset, TileSource};
use crate::store::Persist;
use crate::types::{CellBounds, GeoReference, GlobalCoord, TileId, TileLayout};

/// Serialised value of cells outside the country.
pub const NOT_IN_COUNTRY_VALUE: f64 = -2.0;

/// Serialised value of cells inside the country without data.
pub const NO_DATA_VALUE: f64 = -1.0;

/// Default number of decimals kept when assembling.
pub const DEFAULT_ROUNDING_DIGITS: u32 = 3;

/// Raw values below this are treated as no data even when they differ from
/// the tile's declared `NODATA_value` (e.g. `-3.4028230607370965e38`).
pub const DEFAULT_NODATA_THRESHOLD: f64 = -1000.0;

/// Cells reserved up front when decoding a persisted mosaic.
const MAX_DECODE_RESERVE: usize = 1 << 20;

/// State of one mosaic cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell {
    /// A measured value.
    Value(f64),
    /// Inside the country but the source has no data.
    NoData,
    /// Outside the country.
    OutsideCountry,
}

impl Cell {
    /// The value written to disk for this cell.
    pub fn to_f64(self) -> f64 {
        match self {
            Self::Value(v) => v,
            Self::NoData => NO_DATA_VALUE,
            Self::OutsideCountry => NOT_IN_COUNTRY_VALUE,
        }
    }

    /// Interpret a serialised value using the given sentinels.
    pub fn from_f64(value: f64, not_in_country: f64, no_data: f64) -> Self {
        if value == not_in_country {
            Self::OutsideCountry
        } else if value == no_data {
            Self::NoData
        } else {
            Self::Value(value)
        }
    }

    pub fn value(self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Whether the cell lies inside the country (with or without data).
    pub fn in_country(self) -> bool {
        !matches!(self, Self::OutsideCountry)
    }
}

/// Cropped raster of one country.
#[derive(Debug, Clone, PartialEq)]
pub struct Mosaic {
    ncols: usize,
    nrows: usize,
    cells: Vec<Cell>,
    geo: GeoReference,
}

impl Mosaic {
    /// Create a mosaic from row-major cells.
    pub fn new(ncols: usize, nrows: usize, cells: Vec<Cell>, geo: GeoReference) -> Result<Self> {
        if cells.len() != ncols * nrows {
            return Err(GridError::format(format!(
                "mosaic of {}x{} needs {} cells, got {}",
                ncols,
                nrows,
                ncols * nrows,
                cells.len()
            )));
        }
        Ok(Self {
            ncols,
            nrows,
            cells,
            geo,
        })
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn geo(&self) -> &GeoReference {
        &self.geo
    }

    /// Row-major cells, northernmost row first.
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    /// Cell at (`row`, `col`).
    pub fn get(&self, row: usize, col: usize) -> Option<Cell> {
        if row >= self.nrows || col >= self.ncols {
            return None;
        }
        self.cells.get(row * self.ncols + col).copied()
    }

    /// One row of cells, `None` past the last row.
    pub fn row(&self, row: usize) -> Option<&[Cell]> {
        if row >= self.nrows {
            return None;
        }
        self.cells.get(row * self.ncols..(row + 1) * self.ncols)
    }

    /// Dense copy with sentinels, row-major.
    pub fn values(&self) -> Vec<f64> {
        self.cells.iter().map(|c| c.to_f64()).collect()
    }

    /// Sum of all positive values.
    pub fn total_population(&self) -> f64 {
        self.cells
            .iter()
            .filter_map(|c| c.value())
            .filter(|v| *v > 0.0)
            .sum()
    }

    /// Number of cells inside the country.
    pub fn in_country_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.in_country()).count()
    }

    /// Latitude of each row's cell centre, northernmost row first.
    pub fn latitude_range(&self) -> Vec<f64> {
        (0..self.nrows)
            .map(|row| {
                self.geo.llcrnrlat + (self.nrows - row) as f64 * self.geo.cellsize
                    - 0.5 * self.geo.cellsize
            })
            .collect()
    }

    /// Longitude of each column's cell centre, westernmost column first.
    pub fn longitude_range(&self) -> Vec<f64> {
        (0..self.ncols)
            .map(|col| self.geo.llcrnrlon + (col as f64 + 0.5) * self.geo.cellsize)
            .collect()
    }

    /// Parse a persisted mosaic.
    pub fn decode(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        let ncols: usize = header_field(&mut lines, "ncols")?;
        let nrows: usize = header_field(&mut lines, "nrows")?;
        let llcrnrlon: f64 = header_field(&mut lines, "llcrnrlon")?;
        let llcrnrlat: f64 = header_field(&mut lines, "llcrnrlat")?;
        let cellsize: f64 = header_field(&mut lines, "cellsize")?;
        let not_in_country: f64 = header_field(&mut lines, "NOTINCOUNTRY_value")?;
        let no_data: f64 = header_field(&mut lines, "NODATA_value")?;

        let total = ncols.checked_mul(nrows).ok_or_else(|| {
            GridError::format(format!("mosaic of {}x{} cells is too large", ncols, nrows))
        })?;

        // Header sizes are untrusted; grow past this as rows arrive.
        let mut values = Vec::with_capacity(total.min(MAX_DECODE_RESERVE));
        for row in 0..nrows {
            let line = lines.next().ok_or_else(|| {
                GridError::format(format!("mosaic ends after {} of {} rows", row, nrows))
            })?;
            let n = run_length::decompress_into(line, &mut values, ncols)
                .map_err(|e| e.context(format_args!("mosaic row {}", row)))?;
            if n != ncols {
                return Err(GridError::format(format!(
                    "mosaic row {} expands to {} values, expected {}",
                    row, n, ncols
                )));
            }
        }
        if lines.any(|l| !l.trim().is_empty()) {
            return Err(GridError::format(format!("mosaic has data after row {}", nrows)));
        }

        let cells = values
            .into_iter()
            .map(|v| Cell::from_f64(v, not_in_country, no_data))
            .collect();

        Self::new(
            ncols,
            nrows,
            cells,
            GeoReference {
                llcrnrlon,
                llcrnrlat,
                cellsize,
            },
        )
    }
}

/// Parse the next `<key> <value>` header line.
fn header_field<T: std::str::FromStr>(lines: &mut std::str::Lines<'_>, key: &str) -> Result<T> {
    let line = lines
        .next()
        .ok_or_else(|| GridError::format(format!("mosaic header lacks '{}'", key)))?;
    match line.split_once(' ') {
        Some((k, value)) if k == key => value.trim().parse().map_err(|_| {
            GridError::format(format!("invalid mosaic header {} '{}'", key, value))
        }),
        _ => Err(GridError::format(format!(
            "expected mosaic header '{}', found '{}'",
            key, line
        ))),
    }
}

impl Persist for Mosaic {
    fn encode(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("ncols {}\n", self.ncols));
        out.push_str(&format!("nrows {}\n", self.nrows));
        out.push_str(&format!("llcrnrlon {:?}\n", self.geo.llcrnrlon));
        out.push_str(&format!("llcrnrlat {:?}\n", self.geo.llcrnrlat));
        out.push_str(&format!("cellsize {:?}\n", self.geo.cellsize));
        out.push_str("NOTINCOUNTRY_value -2\n");
        out.push_str("NODATA_value -1\n");

        let mut row = Vec::with_capacity(self.ncols);
        for cells in (0..self.nrows).filter_map(|r| self.row(r)) {
            row.clear();
            row.extend(cells.iter().map(|c| c.to_f64()));
            out.push_str(&run_length::compress(&row));
            out.push('\n');
        }
        out
    }
}

/// Round to `digits` decimals, folding `-0.0` into `0.0`.
pub fn round_to(value: f64, digits: u32) -> f64 {
    let factor = 10f64.powi(digits as i32);
    (value * factor).round() / factor + 0.0
}

/// Options controlling mosaic assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembleOptions {
    /// Decimals kept for every value.
    pub rounding_digits: u32,
    /// Raw values below this count as no data.
    pub nodata_threshold: f64,
    /// Read the tiles concurrently.
    pub parallel: bool,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self {
            rounding_digits: DEFAULT_ROUNDING_DIGITS,
            nodata_threshold: DEFAULT_NODATA_THRESHOLD,
            parallel: false,
        }
    }
}

/// Cells read from one tile.
struct TileSamples {
    tile: TileId,
    cellsize: f64,
    cells: Vec<(GlobalCoord, Cell)>,
}

/// Stitches the attribute tiles of a country into one cropped [`Mosaic`].
pub struct MosaicAssembler<'a, S: ?Sized> {
    source: &'a S,
    layout: &'a TileLayout,
    options: AssembleOptions,
}

impl<'a, S> MosaicAssembler<'a, S>
where
    S: TileSource + ?Sized,
{
    pub fn new(source: &'a S, layout: &'a TileLayout, options: AssembleOptions) -> Self {
        Self {
            source,
            layout,
            options,
        }
    }

    /// Read every indexed cell and crop the result to the country's box.
    pub fn assemble(&self, index: &CountryCoordinateIndex) -> Result<Mosaic> {
        self.check_index(index)?;

        let country = index.country_id();
        let tiles: Vec<(TileId, &TileRows)> =
            index.iter().filter(|(_, rows)| !rows.is_empty()).collect();
        info!(country, tiles = tiles.len(), cells = index.cell_count(), "Assembling mosaic");

        let read = |&(tile, rows): &(TileId, &TileRows)| self.read_tile(tile, rows);
        let samples: Vec<TileSamples> = if self.options.parallel {
            tiles.par_iter().map(read).collect::<Result<_>>()?
        } else {
            tiles.iter().map(read).collect::<Result<_>>()?
        };

        let mut coords = samples.iter().flat_map(|s| &s.cells).map(|(coord, _)| *coord);
        let first = coords.next().ok_or_else(|| {
            GridError::inconsistent(format!("no cells read for country {}", country))
        })?;
        let mut bounds = CellBounds::from_coord(first);
        coords.for_each(|coord| bounds.include(coord));

        let cellsize = samples[0].cellsize;
        if let Some(other) = samples.iter().find(|s| s.cellsize != cellsize) {
            return Err(GridError::format(format!(
                "tile {} has cell size {} but tile {} has {}",
                other.tile, other.cellsize, samples[0].tile, cellsize
            )));
        }

        let (ncols, nrows) = (bounds.width(), bounds.height());
        let mut cells = vec![Cell::OutsideCountry; ncols * nrows];
        let mut no_data = 0usize;
        for (coord, cell) in samples.iter().flat_map(|s| &s.cells) {
            if *cell == Cell::NoData {
                no_data += 1;
            }
            let (r, c) = (coord.row - bounds.min_row, coord.col - bounds.min_col);
            cells[r * ncols + c] = *cell;
        }
        if no_data > 0 {
            debug!(country, cells = no_data, "Country cells without data");
        }

        let geo = GeoReference::for_bounds(self.layout, &bounds, cellsize);
        info!(
            country,
            ncols,
            nrows,
            llcrnrlon = geo.llcrnrlon,
            llcrnrlat = geo.llcrnrlat,
            "Mosaic assembled"
        );
        Mosaic::new(ncols, nrows, cells, geo)
    }

    /// Reject indexes that point outside the recorded tiles or the tile grid.
    fn check_index(&self, index: &CountryCoordinateIndex) -> Result<()> {
        let size = self.layout.tile_size;
        for (tile, rows) in index.iter() {
            if !index.tile_ids().contains(&tile) || !self.layout.contains(tile) {
                return Err(GridError::inconsistent(format!(
                    "tile {} is not a recorded tile of country {}",
                    tile,
                    index.country_id()
                )));
            }
            for (row, cols) in rows {
                let last = cols.last().copied().unwrap_or_default();
                if *row >= size || last >= size {
                    return Err(GridError::inconsistent(format!(
                        "tile {} row {} column {} lies outside the {}x{} tile",
                        tile, row, last, size, size
                    )));
                }
            }
        }
        if index.is_empty() {
            return Err(GridError::inconsistent(format!(
                "coordinate index of country {} has no cells",
                index.country_id()
            )));
        }
        Ok(())
    }

    fn read_tile(&self, tile: TileId, rows: &TileRows) -> Result<TileSamples> {
        let mut reader = self.source.open_tile(Dataset::Population, tile, self.layout)?;
        let header = reader.header().clone();
        let mut cells = Vec::with_capacity(rows.values().map(Vec::len).sum());

        for (&row_id, cols) in rows {
            while reader.rows_read() < row_id {
                reader.skip_row()?;
            }
            let row = reader.read_row()?;

            let mut wanted = cols.iter().copied().peekable();
            for (col, token) in row.split(' ').enumerate() {
                match wanted.peek() {
                    Some(&next) if next == col => {
                        wanted.next();
                    }
                    Some(_) => continue,
                    None => break,
                }
                let raw: f64 = token.parse().map_err(|_| {
                    GridError::format(format!(
                        "{}: row {} column {}: invalid value '{}'",
                        reader_label(tile),
                        row_id,
                        col,
                        token
                    ))
                })?;
                let cell = if raw == header.nodata_value || raw < self.options.nodata_threshold {
                    Cell::NoData
                } else {
                    Cell::Value(round_to(raw, self.options.rounding_digits))
                };
                cells.push((self.layout.to_global(tile, row_id, col), cell));
            }
        }

        debug!(tile = %tile, cells = cells.len(), "Read attribute tile");
        Ok(TileSamples {
            tile,
            cellsize: header.cellsize,
            cells,
        })
    }
}

fn reader_label(tile: TileId) -> String {
    format!("{} tile {}", Dataset::Population.as_str(), tile)
}
