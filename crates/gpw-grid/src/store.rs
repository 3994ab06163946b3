//! Persisted artifacts and the build-or-load policy.
//!
//! Three artifacts are persisted as text:
//!
//! | Artifact | File name |
//! |----------|-----------|
//! | Tile index | `file_index.txt` |
//! | Coordinate index of country `N` | `N_valid_indices.txt` |
//! | Mosaic of country `N` | `N_population.txt` |
//!
//! [`load_or_build`] loads an artifact when the store has it and otherwise
//! builds it, saves it and returns it. Artifacts are written once: stores
//! refuse to replace an existing artifact.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{GridError, Result};

/// Identifies one persisted artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKey {
    /// The global tile index.
    TileIndex,
    /// Coordinate index of one country.
    CoordinateIndex(i32),
    /// Assembled mosaic of one country.
    Mosaic(i32),
}

impl ArtifactKey {
    /// File name used by the filesystem store.
    pub fn file_name(&self) -> String {
        match self {
            Self::TileIndex => "file_index.txt".to_string(),
            Self::CoordinateIndex(country) => format!("{}_valid_indices.txt", country),
            Self::Mosaic(country) => format!("{}_population.txt", country),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TileIndex => write!(f, "tile index"),
            Self::CoordinateIndex(country) => write!(f, "coordinate index of country {}", country),
            Self::Mosaic(country) => write!(f, "mosaic of country {}", country),
        }
    }
}

/// Text serialisation of an artifact.
pub trait Persist {
    fn encode(&self) -> String;
}

/// Storage backend for persisted artifacts.
pub trait ArtifactStore: Send + Sync {
    /// Load an artifact, `None` if it was never saved.
    fn try_load(&self, key: &ArtifactKey) -> Result<Option<String>>;

    /// Save a new artifact. Fails if the artifact already exists.
    fn save(&self, key: &ArtifactKey, contents: &str) -> Result<()>;

    /// Whether the artifact exists.
    fn contains(&self, key: &ArtifactKey) -> Result<bool> {
        Ok(self.try_load(key)?.is_some())
    }
}

/// Load `key` from `store`, or build, save and return it.
///
/// Nothing is written unless `build` succeeds.
pub fn load_or_build<T, St, D, B>(store: &St, key: ArtifactKey, decode: D, build: B) -> Result<T>
where
    T: Persist,
    St: ArtifactStore + ?Sized,
    D: FnOnce(&str) -> Result<T>,
    B: FnOnce() -> Result<T>,
{
    if let Some(text) = store.try_load(&key)? {
        debug!(artifact = %key, bytes = text.len(), "Loading persisted artifact");
        return decode(&text).map_err(|e| e.context(format_args!("persisted {}", key)));
    }

    info!(artifact = %key, "Artifact missing, building");
    let artifact = build()?;
    store.save(&key, &artifact.encode())?;
    info!(artifact = %key, "Artifact saved");
    Ok(artifact)
}

/// Artifacts stored as files in one directory.
#[derive(Debug, Clone)]
pub struct FilesystemStore {
    root: PathBuf,
}

impl FilesystemStore {
    /// Create a store rooted at `root`. The directory is created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of one artifact.
    pub fn path(&self, key: &ArtifactKey) -> PathBuf {
        self.root.join(key.file_name())
    }
}

impl ArtifactStore for FilesystemStore {
    fn try_load(&self, key: &ArtifactKey) -> Result<Option<String>> {
        match std::fs::read_to_string(self.path(key)) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn save(&self, key: &ArtifactKey, contents: &str) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;

        // Write next to the target and move into place so readers never see
        // a partial artifact.
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;

        let path = self.path(key);
        tmp.persist_noclobber(&path).map_err(|e| {
            GridError::Io(std::io::Error::new(
                e.error.kind(),
                format!("{}: {}", path.display(), e.error),
            ))
        })?;
        Ok(())
    }

    fn contains(&self, key: &ArtifactKey) -> Result<bool> {
        Ok(self.path(key).is_file())
    }
}

/// Artifacts kept in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    artifacts: RwLock<HashMap<ArtifactKey, String>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::Relaxed)
    }

    /// Number of stored artifacts.
    pub fn len(&self) -> usize {
        self.artifacts.read().map(|a| a.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ArtifactStore for MemoryStore {
    fn try_load(&self, key: &ArtifactKey) -> Result<Option<String>> {
        let artifacts = self
            .artifacts
            .read()
            .map_err(|_| GridError::Io(std::io::Error::other("memory store lock poisoned")))?;
        Ok(artifacts.get(key).cloned())
    }

    fn save(&self, key: &ArtifactKey, contents: &str) -> Result<()> {
        let mut artifacts = self
            .artifacts
            .write()
            .map_err(|_| GridError::Io(std::io::Error::other("memory store lock poisoned")))?;
        if artifacts.contains_key(key) {
            return Err(GridError::Io(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} already stored", key),
            )));
        }
        artifacts.insert(*key, contents.to_string());
        self.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Text(String);

    impl Persist for Text {
        fn encode(&self) -> String {
            self.0.clone()
        }
    }

    fn decode(text: &str) -> Result<Text> {
        Ok(Text(text.to_string()))
    }

    #[test]
    fn test_file_names() {
        assert_eq!(ArtifactKey::TileIndex.file_name(), "file_index.txt");
        assert_eq!(
            ArtifactKey::CoordinateIndex(76).file_name(),
            "76_valid_indices.txt"
        );
        assert_eq!(ArtifactKey::Mosaic(76).file_name(), "76_population.txt");
    }

    #[test]
    fn test_load_or_build_builds_once() {
        let store = MemoryStore::new();
        let builds = Cell::new(0);
        let build = || -> Result<Text> {
            builds.set(builds.get() + 1);
            Ok(Text("payload\n".to_string()))
        };

        let first = load_or_build(&store, ArtifactKey::Mosaic(1), decode, build).unwrap();
        let second = load_or_build(&store, ArtifactKey::Mosaic(1), decode, build).unwrap();

        assert_eq!(first.0, second.0);
        assert_eq!(builds.get(), 1);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_failed_build_saves_nothing() {
        let store = MemoryStore::new();
        let result = load_or_build(&store, ArtifactKey::TileIndex, decode, || {
            Err::<Text, _>(GridError::format("broken tile"))
        });
        assert!(result.is_err());
        assert!(store.is_empty());
        assert!(!store.contains(&ArtifactKey::TileIndex).unwrap());
    }

    #[test]
    fn test_memory_store_refuses_overwrite() {
        let store = MemoryStore::new();
        store.save(&ArtifactKey::TileIndex, "a").unwrap();
        assert!(store.save(&ArtifactKey::TileIndex, "b").is_err());
        assert_eq!(
            store.try_load(&ArtifactKey::TileIndex).unwrap().as_deref(),
            Some("a")
        );
    }

    #[test]
    fn test_filesystem_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FilesystemStore::new(dir.path().join("output"));
        let key = ArtifactKey::CoordinateIndex(5);

        assert_eq!(store.try_load(&key).unwrap(), None);
        assert!(!store.contains(&key).unwrap());

        store.save(&key, "#header\n1 2 0,3\n").unwrap();
        assert!(store.contains(&key).unwrap());
        assert_eq!(
            store.try_load(&key).unwrap().as_deref(),
            Some("#header\n1 2 0,3\n")
        );
        assert!(store.path(&key).ends_with("output/5_valid_indices.txt"));

        assert!(store.save(&key, "other").is_err());
        assert_eq!(
            std::fs::read_to_string(store.path(&key)).unwrap(),
            "#header\n1 2 0,3\n"
        );
    }
}
