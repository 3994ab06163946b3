//! Country extraction for gridded population tiles
//!
//! This crate turns a global raster split into fixed-size ASCII tiles (a
//! national-identifier grid plus a population grid of the same geometry)
//! into compact per-country artifacts:
//!
//! - **Tile index**: which tiles each country appears in
//! - **Coordinate index**: the tile-local cells of one country, range-encoded
//! - **Mosaic**: the country's population cropped to its bounding box,
//!   run-length encoded
//!
//! Every artifact is built once and persisted; later requests load it.
//!
//! # Architecture
//!
//! ```text
//! country id
//!      │
//!      ▼
//! CountryExtractor::mosaic(id)
//!      │
//!      ├─► TileIndex (scan id tiles once) ──► lookup(id) ──► tile ids
//!      │
//!      ├─► CountryCoordinateIndex::build (scan the country's id tiles)
//!      │
//!      └─► MosaicAssembler::assemble (read population tiles at the indexed
//!               │                     cells, stitch and crop)
//!               ▼
//!          Mosaic ──► ArtifactStore
//! ```
//!
//! # Example
//!
//! ```ignore
//! use gpw_grid::{CountryExtractor, ExtractorConfig};
//!
//! let extractor = CountryExtractor::from_config(ExtractorConfig::from_env())?;
//!
//! let tiles = extractor.lookup(76)?;
//! let mosaic = extractor.mosaic(76)?;
//! println!("{}x{} cells, {} people", mosaic.ncols(), mosaic.nrows(), mosaic.total_population());
//! ```

pub mod ascii;
pub mod codec;
pub mod config;
pub mod coord_index;
pub mod error;
pub mod extractor;
pub mod mosaic;
pub mod source;
pub mod store;
pub mod tile_index;
pub mod types;

// Re-export commonly used types at crate root
pub use ascii::{AsciiHeader, TileReader};
pub use config::ExtractorConfig;
pub use coord_index::{CountryCoordinateIndex, TileRows};
pub use error::{GridError, Result};
pub use extractor::CountryExtractor;
pub use mosaic::{round_to, AssembleOptions, Cell, Mosaic, MosaicAssembler};
pub use source::{Dataset, FilesystemTileSource, MemoryTileSource, TileSource};
pub use store::{load_or_build, ArtifactKey, ArtifactStore, FilesystemStore, MemoryStore, Persist};
pub use tile_index::TileIndex;
pub use types::{CellBounds, GeoReference, GlobalCoord, TileId, TileLayout};
