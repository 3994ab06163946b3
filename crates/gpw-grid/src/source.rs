//! Access to the raw tile files.
//!
//! A [`TileSource`] opens one tile of one dataset as a buffered reader. The
//! filesystem implementation resolves file name patterns such as
//! `gpw_v4_population_count_rev11_2020_30_sec_{id}.asc`; the in-memory one
//! serves synthetic tiles in tests.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Cursor};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::ascii::TileReader;
use crate::error::{GridError, Result};
use crate::types::{TileId, TileLayout};

/// Placeholder replaced by the tile id in file name patterns.
pub const TILE_ID_PLACEHOLDER: &str = "{id}";

/// The raw datasets a tile can belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    /// National identifier grid (one country id per cell).
    CountryIds,
    /// Attribute grid to extract (population count).
    Population,
}

impl Dataset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CountryIds => "country_ids",
            Self::Population => "population",
        }
    }
}

/// Opens raw tiles for scanning.
pub trait TileSource: Send + Sync {
    /// Open one tile for sequential reading.
    fn open(&self, dataset: Dataset, tile: TileId) -> Result<Box<dyn BufRead + Send>>;

    /// Open a tile and parse its header, checking it against the layout.
    fn open_tile(
        &self,
        dataset: Dataset,
        tile: TileId,
        layout: &TileLayout,
    ) -> Result<TileReader<Box<dyn BufRead + Send>>> {
        let label = format!("{} tile {}", dataset.as_str(), tile);
        let reader = TileReader::new(self.open(dataset, tile)?, label, layout.trailing_separator)?;
        reader.expect_shape(layout.tile_size)?;
        Ok(reader)
    }
}

/// Tiles stored as files in two directories.
#[derive(Debug, Clone)]
pub struct FilesystemTileSource {
    country_ids: PathBuf,
    population: PathBuf,
}

impl FilesystemTileSource {
    /// Create a source from two path patterns containing `{id}`.
    pub fn new(country_ids: impl Into<PathBuf>, population: impl Into<PathBuf>) -> Result<Self> {
        let source = Self {
            country_ids: country_ids.into(),
            population: population.into(),
        };
        for pattern in [&source.country_ids, &source.population] {
            if !pattern.to_string_lossy().contains(TILE_ID_PLACEHOLDER) {
                return Err(GridError::config(format!(
                    "tile path pattern {:?} lacks the {} placeholder",
                    pattern, TILE_ID_PLACEHOLDER
                )));
            }
        }
        Ok(source)
    }

    /// Resolve the path of one tile.
    pub fn tile_path(&self, dataset: Dataset, tile: TileId) -> PathBuf {
        let pattern = match dataset {
            Dataset::CountryIds => &self.country_ids,
            Dataset::Population => &self.population,
        };
        resolve_pattern(pattern, tile)
    }
}

fn resolve_pattern(pattern: &Path, tile: TileId) -> PathBuf {
    PathBuf::from(
        pattern
            .to_string_lossy()
            .replace(TILE_ID_PLACEHOLDER, &tile.to_string()),
    )
}

impl TileSource for FilesystemTileSource {
    fn open(&self, dataset: Dataset, tile: TileId) -> Result<Box<dyn BufRead + Send>> {
        let path = self.tile_path(dataset, tile);
        let file = File::open(&path).map_err(|e| {
            GridError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;
        Ok(Box::new(BufReader::with_capacity(1 << 20, file)))
    }
}

/// Tiles held in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryTileSource {
    tiles: HashMap<(Dataset, TileId), Arc<str>>,
}

impl MemoryTileSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the full text of a tile.
    pub fn insert(&mut self, dataset: Dataset, tile: TileId, contents: impl Into<Arc<str>>) {
        self.tiles.insert((dataset, tile), contents.into());
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with_tile(mut self, dataset: Dataset, tile: TileId, contents: impl Into<Arc<str>>) -> Self {
        self.insert(dataset, tile, contents);
        self
    }
}

/// Cursor over a shared tile text.
struct SharedText(Arc<str>);

impl AsRef<[u8]> for SharedText {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl TileSource for MemoryTileSource {
    fn open(&self, dataset: Dataset, tile: TileId) -> Result<Box<dyn BufRead + Send>> {
        let text = self.tiles.get(&(dataset, tile)).ok_or_else(|| {
            GridError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no in-memory {} tile {}", dataset.as_str(), tile),
            ))
        })?;
        Ok(Box::new(Cursor::new(SharedText(Arc::clone(text)))))
    }
}
