//! Configuration for country extraction.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GridError, Result};
use crate::mosaic::{AssembleOptions, DEFAULT_NODATA_THRESHOLD, DEFAULT_ROUNDING_DIGITS};
use crate::source::{FilesystemTileSource, TILE_ID_PLACEHOLDER};
use crate::store::FilesystemStore;
use crate::types::TileLayout;

/// Default national identifier tile pattern, relative to `data_dir`.
pub const DEFAULT_COUNTRY_ID_TILES: &str = "gpw-v4-national-identifier-grid-rev11_30_sec_asc/\
     gpw_v4_national_identifier_grid_rev11_30_sec_{id}.asc";

/// Default population count tile pattern, relative to `data_dir`.
pub const DEFAULT_POPULATION_TILES: &str = "gpw-v4-population-count-rev11_2020_30_sec_asc/\
     gpw_v4_population_count_rev11_2020_30_sec_{id}.asc";

/// Configuration for the extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Directory holding the raw tile folders.
    pub data_dir: PathBuf,

    /// Directory receiving the persisted artifacts.
    pub output_dir: PathBuf,

    /// National identifier tile pattern (relative to `data_dir` unless absolute).
    pub country_id_tiles: String,

    /// Population tile pattern (relative to `data_dir` unless absolute).
    pub population_tiles: String,

    /// Decimals kept in assembled mosaics.
    pub rounding_digits: u32,

    /// Raw values below this count as no data.
    pub nodata_threshold: f64,

    /// Scan tiles concurrently.
    pub parallel_tiles: bool,

    /// Tile geometry.
    pub layout: TileLayout,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            output_dir: data_dir.join("output"),
            data_dir,
            country_id_tiles: DEFAULT_COUNTRY_ID_TILES.to_string(),
            population_tiles: DEFAULT_POPULATION_TILES.to_string(),
            rounding_digits: DEFAULT_ROUNDING_DIGITS,
            nodata_threshold: DEFAULT_NODATA_THRESHOLD,
            parallel_tiles: false,
            layout: TileLayout::gpw(),
        }
    }
}

/// `~/.sedac_gpw_parser`, or the working directory without a home.
fn default_data_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_default()
        .join(".sedac_gpw_parser")
}

impl ExtractorConfig {
    /// Configuration rooted at `data_dir`, output in `data_dir/output`.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            output_dir: data_dir.join("output"),
            data_dir,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables on top of the defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("GPW_DATA_DIR") {
            config.data_dir = PathBuf::from(&val);
            config.output_dir = config.data_dir.join("output");
        }

        if let Ok(val) = std::env::var("GPW_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var("GPW_COUNTRY_ID_TILES") {
            config.country_id_tiles = val;
        }

        if let Ok(val) = std::env::var("GPW_POPULATION_TILES") {
            config.population_tiles = val;
        }

        if let Ok(val) = std::env::var("GPW_ROUNDING_DIGITS") {
            if let Ok(digits) = val.parse() {
                config.rounding_digits = digits;
            }
        }

        if let Ok(val) = std::env::var("GPW_PARALLEL_TILES") {
            config.parallel_tiles = val.to_lowercase() == "true" || val == "1";
        }

        config
    }

    /// Load configuration from a YAML file. Missing keys keep their defaults.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        self.layout.validate()?;

        if self.rounding_digits > 15 {
            return Err(GridError::config("rounding_digits must be <= 15"));
        }

        if self.nodata_threshold >= 0.0 {
            return Err(GridError::config("nodata_threshold must be negative"));
        }

        for (name, pattern) in [
            ("country_id_tiles", &self.country_id_tiles),
            ("population_tiles", &self.population_tiles),
        ] {
            if !pattern.contains(TILE_ID_PLACEHOLDER) {
                return Err(GridError::config(format!(
                    "{} must contain the {} placeholder",
                    name, TILE_ID_PLACEHOLDER
                )));
            }
        }

        Ok(())
    }

    /// Tile source reading the configured patterns.
    pub fn tile_source(&self) -> Result<FilesystemTileSource> {
        FilesystemTileSource::new(
            self.data_dir.join(&self.country_id_tiles),
            self.data_dir.join(&self.population_tiles),
        )
    }

    /// Store writing into `output_dir`.
    pub fn store(&self) -> FilesystemStore {
        FilesystemStore::new(&self.output_dir)
    }

    /// Mosaic assembly options.
    pub fn assemble_options(&self) -> AssembleOptions {
        AssembleOptions {
            rounding_digits: self.rounding_digits,
            nodata_threshold: self.nodata_threshold,
            parallel: self.parallel_tiles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ExtractorConfig::default();
        assert_eq!(config.rounding_digits, 3);
        assert_eq!(config.nodata_threshold, -1000.0);
        assert!(!config.parallel_tiles);
        assert_eq!(config.layout, TileLayout::gpw());
        assert!(config.output_dir.ends_with(".sedac_gpw_parser/output"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ExtractorConfig::default();
        config.rounding_digits = 16;
        assert!(config.validate().is_err());

        config = ExtractorConfig::default();
        config.population_tiles = "pop.asc".to_string();
        assert!(config.validate().is_err());

        config = ExtractorConfig::default();
        config.nodata_threshold = 0.0;
        assert!(config.validate().is_err());

        config = ExtractorConfig::default();
        config.layout.tiles_per_row = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_partial_config() {
        let config = ExtractorConfig::from_yaml_str(
            "data_dir: /srv/gpw\n\
             output_dir: /srv/gpw/out\n\
             parallel_tiles: true\n\
             layout:\n  tile_size: 4\n  trailing_separator: false\n",
        )
        .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/srv/gpw"));
        assert_eq!(config.output_dir, PathBuf::from("/srv/gpw/out"));
        assert!(config.parallel_tiles);
        assert_eq!(config.layout.tile_size, 4);
        assert_eq!(config.layout.tiles_per_row, 4);
        assert!(!config.layout.trailing_separator);
        assert_eq!(config.rounding_digits, 3);
    }

    #[test]
    fn test_yaml_rejects_garbage() {
        assert!(matches!(
            ExtractorConfig::from_yaml_str("rounding_digits: [1, 2]"),
            Err(GridError::Config(_))
        ));
    }

    #[test]
    fn test_tile_source_paths() {
        let config = ExtractorConfig::with_data_dir("/data");
        let source = config.tile_source().unwrap();
        let tile = crate::types::TileId::new(3).unwrap();
        let path = source.tile_path(crate::source::Dataset::Population, tile);
        assert_eq!(
            path,
            PathBuf::from(
                "/data/gpw-v4-population-count-rev11_2020_30_sec_asc/\
                 gpw_v4_population_count_rev11_2020_30_sec_3.asc"
            )
        );
        assert_eq!(config.store().root(), Path::new("/data/output"));
    }
}
