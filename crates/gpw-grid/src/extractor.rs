//! Build-or-load pipeline for one country.
//!
//! `CountryExtractor` ties the tile source, the artifact store and the
//! configuration together. Each artifact is loaded when present and built
//! (then saved) otherwise:
//!
//! ```text
//! tile index ──lookup──▶ coordinate index ──assemble──▶ mosaic
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use gpw_grid::{CountryExtractor, ExtractorConfig};
//!
//! let extractor = CountryExtractor::from_config(ExtractorConfig::from_env())?;
//! let mosaic = extractor.mosaic(76)?;
//! println!("{} people", mosaic.total_population());
//! ```

use std::sync::OnceLock;

use tracing::{info, warn};

use crate::config::ExtractorConfig;
use crate::coord_index::CountryCoordinateIndex;
use crate::error::Result;
use crate::mosaic::{Mosaic, MosaicAssembler};
use crate::source::{FilesystemTileSource, TileSource};
use crate::store::{load_or_build, ArtifactKey, ArtifactStore, FilesystemStore};
use crate::tile_index::TileIndex;
use crate::types::TileId;

/// Extracts country artifacts from a tile source into a store.
pub struct CountryExtractor<T = FilesystemTileSource, S = FilesystemStore> {
    config: ExtractorConfig,
    source: T,
    store: S,
    tile_index: OnceLock<TileIndex>,
}

impl CountryExtractor {
    /// Extractor reading tiles from disk and persisting into `output_dir`.
    pub fn from_config(config: ExtractorConfig) -> Result<Self> {
        let source = config.tile_source()?;
        let store = config.store();
        Self::new(config, source, store)
    }
}

impl<T, S> CountryExtractor<T, S>
where
    T: TileSource,
    S: ArtifactStore,
{
    /// Create an extractor. Fails if the configuration is invalid.
    pub fn new(config: ExtractorConfig, source: T, store: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            source,
            store,
            tile_index: OnceLock::new(),
        })
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn source(&self) -> &T {
        &self.source
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// The tile index, loaded or built on first use and kept afterwards.
    pub fn tile_index(&self) -> Result<&TileIndex> {
        if let Some(index) = self.tile_index.get() {
            return Ok(index);
        }

        let index = load_or_build(&self.store, ArtifactKey::TileIndex, TileIndex::decode, || {
            TileIndex::build(&self.source, &self.config.layout, self.config.parallel_tiles)
        })?;
        info!(countries = index.len(), "Tile index ready");

        // A concurrent caller may have won the race; both values are equal.
        Ok(self.tile_index.get_or_init(|| index))
    }

    /// Tiles containing `country`.
    pub fn lookup(&self, country: i32) -> Result<Vec<TileId>> {
        Ok(self.tile_index()?.lookup(country)?.to_vec())
    }

    /// Coordinate index of `country`.
    pub fn coordinate_index(&self, country: i32) -> Result<CountryCoordinateIndex> {
        let tiles = self.lookup(country)?;
        let index = load_or_build(
            &self.store,
            ArtifactKey::CoordinateIndex(country),
            |text| CountryCoordinateIndex::decode(text, country, &tiles),
            || {
                CountryCoordinateIndex::build(
                    &self.source,
                    &self.config.layout,
                    country,
                    &tiles,
                    self.config.parallel_tiles,
                )
            },
        )?;

        if index.is_empty() {
            warn!(country, "Coordinate index holds no cells");
        }
        Ok(index)
    }

    /// Cropped population mosaic of `country`.
    ///
    /// A persisted mosaic is returned without touching the indexes.
    pub fn mosaic(&self, country: i32) -> Result<Mosaic> {
        load_or_build(&self.store, ArtifactKey::Mosaic(country), Mosaic::decode, || {
            let index = self.coordinate_index(country)?;
            MosaicAssembler::new(
                &self.source,
                &self.config.layout,
                self.config.assemble_options(),
            )
            .assemble(&index)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GridError;
    use crate::mosaic::Cell;
    use crate::source::{Dataset, MemoryTileSource};
    use crate::store::MemoryStore;
    use crate::types::TileLayout;

    const SIZE: usize = 2;

    fn tile_text(rows: &[&str]) -> String {
        let mut text = format!(
            "ncols         {size}\nnrows         {size}\nxllcorner     -180\n\
             yllcorner     -90\ncellsize      45\nNODATA_value  -9999\n",
            size = SIZE
        );
        for row in rows {
            text.push_str(row);
            text.push('\n');
        }
        text
    }

    /// Two-by-two tiles; country 7 lives in tiles 1 and 2.
    fn source() -> MemoryTileSource {
        let layout = TileLayout::synthetic(SIZE);
        let mut source = MemoryTileSource::new();
        for tile in layout.tile_ids() {
            let (ids, pop) = match tile.get() {
                1 => (["-32768 7", "-32768 -32768"], ["-9999 4.5", "-9999 -9999"]),
                2 => (["7 -32768", "3 3"], ["1.25 -9999", "2 2"]),
                _ => (["-32768 -32768", "-32768 -32768"], ["0 0", "0 0"]),
            };
            source.insert(Dataset::CountryIds, tile, tile_text(&ids));
            source.insert(Dataset::Population, tile, tile_text(&pop));
        }
        source
    }

    fn extractor() -> CountryExtractor<MemoryTileSource, MemoryStore> {
        let mut config = ExtractorConfig::with_data_dir("/unused");
        config.layout = TileLayout::synthetic(SIZE);
        CountryExtractor::new(config, source(), MemoryStore::new()).unwrap()
    }

    #[test]
    fn test_lookup() {
        let extractor = extractor();
        let tiles: Vec<u16> = extractor.lookup(7).unwrap().iter().map(|t| t.get()).collect();
        assert_eq!(tiles, vec![1, 2]);
        assert!(matches!(extractor.lookup(99), Err(GridError::NotFound(99))));
    }

    #[test]
    fn test_mosaic_stitches_neighbouring_tiles() {
        let extractor = extractor();
        let mosaic = extractor.mosaic(7).unwrap();

        // Tile 1 column 1 and tile 2 column 0 are global columns 1 and 2.
        assert_eq!((mosaic.ncols(), mosaic.nrows()), (2, 1));
        assert_eq!(mosaic.get(0, 0), Some(Cell::Value(4.5)));
        assert_eq!(mosaic.get(0, 1), Some(Cell::Value(1.25)));
        assert_eq!(mosaic.total_population(), 5.75);
        assert_eq!(mosaic.geo().llcrnrlon, -135.0);
        assert_eq!(mosaic.geo().llcrnrlat, 45.0);
    }

    #[test]
    fn test_artifacts_built_once() {
        let extractor = extractor();
        let first = extractor.mosaic(7).unwrap();
        assert_eq!(extractor.store().save_count(), 3);

        let second = extractor.mosaic(7).unwrap();
        assert_eq!(first, second);
        assert_eq!(extractor.store().save_count(), 3);

        extractor.coordinate_index(3).unwrap();
        assert_eq!(extractor.store().save_count(), 4);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = ExtractorConfig::with_data_dir("/unused");
        config.rounding_digits = 40;
        assert!(CountryExtractor::new(config, source(), MemoryStore::new()).is_err());
    }
}
