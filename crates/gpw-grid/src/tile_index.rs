//! Global index of which tiles contain which countries.
//!
//! Built once per dataset installation by scanning every country-identifier
//! tile, then persisted as:
//!
//! ```text
//! #COUNTRY_ID FILE_IDS
//! 222 1,2
//! 643 1,3,4
//! ```

use std::collections::{BTreeMap, HashSet};

use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{GridError, Result};
use crate::source::{Dataset, TileSource};
use crate::store::Persist;
use crate::types::{TileId, TileLayout};

/// Header line of the persisted tile index.
pub const TILE_INDEX_HEADER: &str = "#COUNTRY_ID FILE_IDS";

/// Mapping from country identifier to the tiles containing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileIndex {
    countries: BTreeMap<i32, Vec<TileId>>,
}

impl TileIndex {
    /// Scan every tile of the layout and index the countries found.
    ///
    /// With `parallel` set, tiles are scanned concurrently and merged in tile
    /// order, giving the same index as the sequential scan.
    pub fn build<S>(source: &S, layout: &TileLayout, parallel: bool) -> Result<Self>
    where
        S: TileSource + ?Sized,
    {
        let tiles: Vec<TileId> = layout.tile_ids().collect();
        info!(tiles = tiles.len(), parallel, "Building tile index");

        let scanned: Vec<(TileId, HashSet<i32>)> = if parallel {
            tiles
                .par_iter()
                .map(|&tile| -> Result<(TileId, HashSet<i32>)> {
                    Ok((tile, scan_tile(source, layout, tile)?))
                })
                .collect::<Result<_>>()?
        } else {
            tiles
                .iter()
                .map(|&tile| -> Result<(TileId, HashSet<i32>)> {
                    Ok((tile, scan_tile(source, layout, tile)?))
                })
                .collect::<Result<_>>()?
        };

        let index = Self::from_tile_sets(scanned);
        info!(countries = index.len(), "Tile index built");
        Ok(index)
    }

    /// Merge per-tile country sets. Tile lists come out sorted and unique
    /// whatever the input order.
    pub fn from_tile_sets<I, C>(tile_sets: I) -> Self
    where
        I: IntoIterator<Item = (TileId, C)>,
        C: IntoIterator<Item = i32>,
    {
        let mut countries: BTreeMap<i32, Vec<TileId>> = BTreeMap::new();
        for (tile, ids) in tile_sets {
            for country in ids {
                let tiles = countries.entry(country).or_default();
                if let Err(pos) = tiles.binary_search(&tile) {
                    tiles.insert(pos, tile);
                }
            }
        }
        Self { countries }
    }

    /// Tiles containing `country`, in ascending order.
    pub fn lookup(&self, country: i32) -> Result<&[TileId]> {
        self.countries
            .get(&country)
            .map(Vec::as_slice)
            .ok_or(GridError::NotFound(country))
    }

    /// All indexed country identifiers, ascending.
    pub fn countries(&self) -> impl Iterator<Item = i32> + '_ {
        self.countries.keys().copied()
    }

    /// Iterate over `(country, tiles)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (i32, &[TileId])> {
        self.countries.iter().map(|(c, t)| (*c, t.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    /// Parse a persisted tile index.
    pub fn decode(text: &str) -> Result<Self> {
        let mut lines = text.lines();
        match lines.next() {
            Some(header) if header.starts_with('#') => {}
            _ => return Err(GridError::format("tile index lacks its header line")),
        }

        let mut countries = BTreeMap::new();
        for (n, line) in lines.enumerate() {
            let (country, tiles) = line.split_once(' ').ok_or_else(|| {
                GridError::format(format!("tile index line {}: '{}'", n + 2, line))
            })?;
            let country: i32 = country.parse().map_err(|_| {
                GridError::format(format!("tile index line {}: bad country id '{}'", n + 2, country))
            })?;

            let tiles = tiles
                .split(',')
                .map(str::parse::<TileId>)
                .collect::<Result<Vec<_>>>()?;
            if tiles.is_empty() || tiles.windows(2).any(|w| w[0] >= w[1]) {
                return Err(GridError::format(format!(
                    "tile index line {}: tile ids must be ascending and unique",
                    n + 2
                )));
            }

            if countries.insert(country, tiles).is_some() {
                return Err(GridError::format(format!(
                    "tile index lists country {} twice",
                    country
                )));
            }
        }

        Ok(Self { countries })
    }
}

impl Persist for TileIndex {
    fn encode(&self) -> String {
        let mut out = String::with_capacity(16 * (self.countries.len() + 1));
        out.push_str(TILE_INDEX_HEADER);
        out.push('\n');
        for (country, tiles) in &self.countries {
            let tiles: Vec<String> = tiles.iter().map(TileId::to_string).collect();
            out.push_str(&format!("{} {}\n", country, tiles.join(",")));
        }
        out
    }
}

/// Collect the distinct country identifiers of one tile.
fn scan_tile<S>(source: &S, layout: &TileLayout, tile: TileId) -> Result<HashSet<i32>>
where
    S: TileSource + ?Sized,
{
    let mut reader = source.open_tile(Dataset::CountryIds, tile, layout)?;
    let mut ids = HashSet::new();

    for _ in 0..reader.header().nrows {
        let row = reader.read_row()?;
        let mut previous: Option<&str> = None;
        for token in row.split(' ') {
            // Identifiers come in long runs; only parse on change.
            if previous == Some(token) {
                continue;
            }
            previous = Some(token);
            let id: i32 = token.parse().map_err(|_| {
                GridError::format(format!("country id tile {}: invalid identifier '{}'", tile, token))
            })?;
            ids.insert(id);
        }
    }
    reader.finish()?;

    ids.remove(&layout.no_country_value);
    debug!(tile = %tile, countries = ids.len(), "Scanned country identifier tile");
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(id: u16) -> TileId {
        TileId::new(id).unwrap()
    }

    #[test]
    fn test_from_tile_sets() {
        let index = TileIndex::from_tile_sets(vec![
            (tile(1), vec![10, 20]),
            (tile(2), vec![20]),
        ]);
        assert_eq!(index.lookup(10).unwrap(), &[tile(1)]);
        assert_eq!(index.lookup(20).unwrap(), &[tile(1), tile(2)]);
        assert!(matches!(index.lookup(30), Err(GridError::NotFound(30))));
    }

    #[test]
    fn test_from_tile_sets_no_duplicates() {
        let index = TileIndex::from_tile_sets(vec![
            (tile(3), vec![5]),
            (tile(1), vec![5, 5]),
            (tile(3), vec![5]),
        ]);
        assert_eq!(index.lookup(5).unwrap(), &[tile(1), tile(3)]);
    }

    #[test]
    fn test_encode_decode() {
        let index = TileIndex::from_tile_sets(vec![
            (tile(1), vec![643, 222]),
            (tile(3), vec![643]),
            (tile(4), vec![643]),
            (tile(2), vec![222]),
        ]);
        let text = index.encode();
        assert_eq!(text, "#COUNTRY_ID FILE_IDS\n222 1,2\n643 1,3,4\n");
        let decoded = TileIndex::decode(&text).unwrap();
        assert_eq!(decoded, index);
        assert_eq!(decoded.encode(), text);
    }

    #[test]
    fn test_decode_rejects_malformed() {
        assert!(TileIndex::decode("").unwrap_err().is_format());
        assert!(TileIndex::decode("222 1,2\n").unwrap_err().is_format());
        assert!(TileIndex::decode("#h\n222\n").unwrap_err().is_format());
        assert!(TileIndex::decode("#h\n222 1,1\n").unwrap_err().is_format());
        assert!(TileIndex::decode("#h\n222 2,1\n").unwrap_err().is_format());
        assert!(TileIndex::decode("#h\n222 0\n").unwrap_err().is_format());
        assert!(TileIndex::decode("#h\nabc 1\n").unwrap_err().is_format());
        assert!(TileIndex::decode("#h\n5 1\n5 2\n").unwrap_err().is_format());
    }

    #[test]
    fn test_countries_listing() {
        let index = TileIndex::from_tile_sets(vec![(tile(1), vec![7, 3])]);
        assert_eq!(index.countries().collect::<Vec<_>>(), vec![3, 7]);
        assert_eq!(index.len(), 2);
    }
}
