//! Synthetic tile datasets written to a temporary directory.
//!
//! A [`SyntheticDataset`] holds one identifier grid and one population grid
//! per tile of a 4x2 layout. Cells are painted in memory and the tiles are
//! then written as ASCII grids:
//!
//! ```text
//! <root>/ids/ids_{id}.asc
//! <root>/population/population_{id}.asc
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::generators::{
    ascii_grid, create_empty_country_grid, create_population_grid, AsciiGridSpec,
};

/// Tiles per row of the synthetic layout.
pub const TILES_PER_ROW: usize = 4;

/// Tile rows of the synthetic layout.
pub const TILE_ROWS: usize = 2;

/// Pattern of identifier tiles, relative to the dataset root.
pub const COUNTRY_ID_PATTERN: &str = "ids/ids_{id}.asc";

/// Pattern of population tiles, relative to the dataset root.
pub const POPULATION_PATTERN: &str = "population/population_{id}.asc";

/// Eight square tiles with paintable identifier and population cells.
pub struct SyntheticDataset {
    dir: TempDir,
    size: usize,
    cellsize: f64,
    trailing_separator: bool,
    ids: BTreeMap<u16, Vec<i32>>,
    population: BTreeMap<u16, Vec<f64>>,
}

impl SyntheticDataset {
    /// Dataset of `size`x`size` tiles, nobody's land, populated with
    /// `create_population_grid` values.
    pub fn new(size: usize) -> Self {
        let tiles = 1..=(TILES_PER_ROW * TILE_ROWS) as u16;
        Self {
            dir: temp_test_dir_with_prefix("gpw-synthetic-"),
            size,
            cellsize: 1.0,
            trailing_separator: false,
            ids: tiles
                .clone()
                .map(|t| (t, create_empty_country_grid(size)))
                .collect(),
            population: tiles.map(|t| (t, create_population_grid(size))).collect(),
        }
    }

    pub fn with_cellsize(mut self, cellsize: f64) -> Self {
        self.cellsize = cellsize;
        self
    }

    /// Write rows with a trailing space, as the published tiles do.
    pub fn with_trailing_separator(mut self) -> Self {
        self.trailing_separator = true;
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Root directory holding the tile folders.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Directory for persisted artifacts, inside the dataset root.
    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("output")
    }

    /// Assign the cell at (`row`, `col`) of `tile` to `country`.
    pub fn set_country(&mut self, tile: u16, row: usize, col: usize, country: i32) -> &mut Self {
        let index = self.cell(tile, row, col);
        self.grid_mut(tile).0[index] = country;
        self
    }

    /// Set the population of the cell at (`row`, `col`) of `tile`.
    pub fn set_population(&mut self, tile: u16, row: usize, col: usize, value: f64) -> &mut Self {
        let index = self.cell(tile, row, col);
        self.grid_mut(tile).1[index] = value;
        self
    }

    /// Assign a rectangle of `tile` to `country`, rows and columns half-open.
    pub fn paint_rect(
        &mut self,
        tile: u16,
        rows: std::ops::Range<usize>,
        cols: std::ops::Range<usize>,
        country: i32,
    ) -> &mut Self {
        for row in rows {
            for col in cols.clone() {
                self.set_country(tile, row, col, country);
            }
        }
        self
    }

    /// Render the identifier grid of `tile`.
    pub fn country_tile_text(&self, tile: u16) -> String {
        let spec = self.spec().with_nodata(crate::NO_COUNTRY as f64);
        ascii_grid(&spec, &self.ids[&tile])
    }

    /// Render the population grid of `tile`.
    pub fn population_tile_text(&self, tile: u16) -> String {
        ascii_grid(&self.spec(), &self.population[&tile])
    }

    /// Path of the identifier tile `tile`.
    pub fn country_tile_path(&self, tile: u16) -> PathBuf {
        self.root()
            .join(COUNTRY_ID_PATTERN.replace("{id}", &tile.to_string()))
    }

    /// Path of the population tile `tile`.
    pub fn population_tile_path(&self, tile: u16) -> PathBuf {
        self.root()
            .join(POPULATION_PATTERN.replace("{id}", &tile.to_string()))
    }

    /// Write all sixteen tiles.
    pub fn write(&self) -> std::io::Result<()> {
        for &tile in self.ids.keys() {
            write_file(&self.country_tile_path(tile), &self.country_tile_text(tile))?;
            write_file(&self.population_tile_path(tile), &self.population_tile_text(tile))?;
        }
        Ok(())
    }

    fn spec(&self) -> AsciiGridSpec {
        AsciiGridSpec::square(self.size)
            .with_cellsize(self.cellsize)
            .with_trailing_separator(self.trailing_separator)
    }

    fn cell(&self, tile: u16, row: usize, col: usize) -> usize {
        assert!(
            row < self.size && col < self.size,
            "cell ({}, {}) outside the {}x{} tile {}",
            row,
            col,
            self.size,
            self.size,
            tile
        );
        row * self.size + col
    }

    fn grid_mut(&mut self, tile: u16) -> (&mut Vec<i32>, &mut Vec<f64>) {
        let ids = self.ids.get_mut(&tile);
        let population = self.population.get_mut(&tile);
        match (ids, population) {
            (Some(ids), Some(population)) => (ids, population),
            _ => panic!("tile {} is not part of the synthetic layout", tile),
        }
    }
}

/// Write `contents` to `path`, creating parent directories.
pub fn write_file(path: &Path, contents: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)
}

/// Creates a temporary directory with a custom prefix.
///
/// The directory is deleted when the returned `TempDir` is dropped.
pub fn temp_test_dir_with_prefix(prefix: &str) -> TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("Failed to create temp directory")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generators::population_at;

    #[test]
    fn test_paint_and_render() {
        let mut dataset = SyntheticDataset::new(3);
        dataset.set_country(2, 1, 2, 42).set_population(2, 1, 2, 7.5);

        let ids = dataset.country_tile_text(2);
        assert!(ids.contains("NODATA_value  -32768\n"));
        assert!(ids.ends_with("-32768 -32768 -32768\n-32768 -32768 42\n-32768 -32768 -32768\n"));

        let population = dataset.population_tile_text(2);
        assert!(population.contains("\n100.25 101.25 7.5\n"));
        assert!(population.ends_with(&format!("{}\n", population_at(2, 2))));
    }

    #[test]
    fn test_write_all_tiles() {
        let mut dataset = SyntheticDataset::new(2).with_trailing_separator();
        dataset.paint_rect(8, 0..2, 0..2, 5);
        dataset.write().unwrap();

        for tile in 1..=8 {
            assert!(dataset.country_tile_path(tile).is_file());
            assert!(dataset.population_tile_path(tile).is_file());
        }
        let text = std::fs::read_to_string(dataset.country_tile_path(8)).unwrap();
        assert!(text.ends_with("5 5 \n5 5 \n"));
    }

    #[test]
    #[should_panic(expected = "cell (2, 0) outside the 2x2 tile 3")]
    fn test_cell_out_of_range() {
        SyntheticDataset::new(2).set_country(3, 2, 0, 1);
    }
}
