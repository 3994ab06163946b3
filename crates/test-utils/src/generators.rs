//! Generators for synthetic ESRI ASCII grid tiles.
//!
//! The generated text follows the layout of the GPW tiles: six header lines
//! followed by `nrows` rows of `ncols` space-separated values, optionally with
//! a trailing space before each newline.

use std::fmt::Display;

/// Identifier used for cells that belong to no country.
pub const NO_COUNTRY: i32 = -32768;

/// `NODATA_value` declared in synthetic population headers.
pub const POPULATION_NODATA: f64 = -9999.0;

/// Header of one synthetic tile.
#[derive(Debug, Clone, PartialEq)]
pub struct AsciiGridSpec {
    pub ncols: usize,
    pub nrows: usize,
    pub xllcorner: f64,
    pub yllcorner: f64,
    pub cellsize: f64,
    pub nodata_value: f64,
    /// Emit a space after the last value of each row.
    pub trailing_separator: bool,
}

impl AsciiGridSpec {
    /// Square tile of `size` cells with a one-degree cell size.
    pub fn square(size: usize) -> Self {
        Self {
            ncols: size,
            nrows: size,
            xllcorner: -180.0,
            yllcorner: -90.0,
            cellsize: 1.0,
            nodata_value: POPULATION_NODATA,
            trailing_separator: false,
        }
    }

    pub fn with_cellsize(mut self, cellsize: f64) -> Self {
        self.cellsize = cellsize;
        self
    }

    pub fn with_nodata(mut self, nodata_value: f64) -> Self {
        self.nodata_value = nodata_value;
        self
    }

    pub fn with_trailing_separator(mut self, trailing_separator: bool) -> Self {
        self.trailing_separator = trailing_separator;
        self
    }

    /// The six header lines.
    pub fn header(&self) -> String {
        format!(
            "ncols         {}\nnrows         {}\nxllcorner     {}\nyllcorner     {}\n\
             cellsize      {}\nNODATA_value  {}\n",
            self.ncols, self.nrows, self.xllcorner, self.yllcorner, self.cellsize, self.nodata_value
        )
    }
}

/// Renders a complete tile from row-major `values`.
///
/// # Example
///
/// ```
/// use test_utils::{ascii_grid, AsciiGridSpec};
///
/// let text = ascii_grid(&AsciiGridSpec::square(2), &[1, 2, 3, 4]);
/// assert!(text.ends_with("1 2\n3 4\n"));
/// ```
///
/// # Panics
///
/// If `values` does not hold exactly `ncols * nrows` entries.
pub fn ascii_grid<T: Display>(spec: &AsciiGridSpec, values: &[T]) -> String {
    assert_eq!(
        values.len(),
        spec.ncols * spec.nrows,
        "grid needs {}x{} values",
        spec.ncols,
        spec.nrows
    );

    let mut text = spec.header();
    for row in values.chunks(spec.ncols) {
        let tokens: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        text.push_str(&tokens.join(" "));
        if spec.trailing_separator {
            text.push(' ');
        }
        text.push('\n');
    }
    text
}

/// Creates an identifier grid where every cell belongs to no country.
pub fn create_empty_country_grid(size: usize) -> Vec<i32> {
    vec![NO_COUNTRY; size * size]
}

/// Creates a population grid with predictable values.
///
/// Each cell value is `row * 100 + col + 0.25`, so the position of every
/// value read back can be verified.
///
/// # Example
///
/// ```
/// use test_utils::create_population_grid;
///
/// let grid = create_population_grid(4);
/// assert_eq!(grid[0], 0.25);
/// assert_eq!(grid[5], 101.25); // row 1, col 1
/// ```
pub fn create_population_grid(size: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(size * size);
    for row in 0..size {
        for col in 0..size {
            data.push((row * 100 + col) as f64 + 0.25);
        }
    }
    data
}

/// Value `create_population_grid` puts at (`row`, `col`).
pub fn population_at(row: usize, col: usize) -> f64 {
    (row * 100 + col) as f64 + 0.25
}
