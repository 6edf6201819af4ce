#![forbid(unsafe_code)]

//! Registry persistence: snapshot stores and the teardown merge.
//!
//! [`sync`] implements the persistence contract: read whatever snapshot
//! the store currently holds (an unreadable or corrupt snapshot degrades
//! to empty), merge the live registry over it (live entries win), write
//! the result back. Safe to invoke any number of times.
//!
//! # File Format
//!
//! ```json
//! {
//!   "version": 1,
//!   "snapshot": {
//!     "id_to_state": { "17099000000000": { ... } },
//!     "fingerprint_to_id": { "{\"data\":null,...}": "17099000000000" },
//!     "location_to_id": { "https://example.test/a": "17099000000000" }
//!   }
//! }
//! ```
//!
//! # Atomic Writes
//!
//! [`FileStore`] writes use a temp-file-then-rename pattern to prevent
//! corruption on crash.

use std::convert::Infallible;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use wayfare_backend::StateStore;
use wayfare_core::registry::{RegistrySnapshot, StateRegistry};

/// Current snapshot file format version.
const FORMAT_VERSION: u64 = 1;

/// On-disk wrapper around a [`RegistrySnapshot`].
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u64,
    snapshot: RegistrySnapshot,
}

/// Store failure. Never propagated past the sync layer.
#[derive(Debug)]
pub enum StoreError {
    /// Filesystem failure.
    Io(io::Error),
    /// Unparseable or version-incompatible snapshot.
    Format(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "snapshot io error: {err}"),
            Self::Format(detail) => write!(f, "snapshot format error: {detail}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// In-memory store for tests and hosts without session persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshot: Option<RegistrySnapshot>,
    /// Number of writes observed (teardown idempotence checks).
    pub writes: u64,
}

impl MemoryStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a snapshot.
    #[must_use]
    pub fn seeded(snapshot: RegistrySnapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
            writes: 0,
        }
    }

    /// The currently held snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Option<&RegistrySnapshot> {
        self.snapshot.as_ref()
    }
}

impl StateStore for MemoryStore {
    type Error = Infallible;

    fn read(&self) -> Result<Option<RegistrySnapshot>, Self::Error> {
        Ok(self.snapshot.clone())
    }

    fn write(&mut self, snapshot: &RegistrySnapshot) -> Result<(), Self::Error> {
        self.snapshot = Some(snapshot.clone());
        self.writes += 1;
        Ok(())
    }
}

/// JSON-file-backed store.
///
/// Missing file reads as "nothing persisted"; a corrupt or
/// version-mismatched file is a [`StoreError`] (which the sync layer
/// degrades to an empty snapshot).
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Store at the given path. The parent directory must exist.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStore {
    type Error = StoreError;

    fn read(&self) -> Result<Option<RegistrySnapshot>, Self::Error> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path).map_err(StoreError::Io)?;
        let file: SnapshotFile = serde_json::from_str(&contents)
            .map_err(|e| StoreError::Format(format!("failed to parse snapshot: {e}")))?;
        if file.version != FORMAT_VERSION {
            return Err(StoreError::Format(format!(
                "unsupported snapshot version: {} (expected {FORMAT_VERSION})",
                file.version
            )));
        }
        Ok(Some(file.snapshot))
    }

    fn write(&mut self, snapshot: &RegistrySnapshot) -> Result<(), Self::Error> {
        let file = SnapshotFile {
            version: FORMAT_VERSION,
            snapshot: snapshot.clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| StoreError::Format(format!("failed to serialize snapshot: {e}")))?;
        let temp = self.path.with_extension("json.tmp");
        std::fs::write(&temp, json).map_err(StoreError::Io)?;
        std::fs::rename(&temp, &self.path).map_err(StoreError::Io)?;
        Ok(())
    }
}

/// Merge the live registry into the persisted snapshot and write it back.
///
/// Read failures degrade to an empty base (logged, never propagated);
/// write failures are logged and dropped. Idempotent: repeated calls
/// with an unchanged registry write identical snapshots.
pub fn sync<S: StateStore>(registry: &StateRegistry, store: &mut S) {
    let base = match store.read() {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => RegistrySnapshot::default(),
        Err(err) => {
            warn!(error = %err, "persisted snapshot unreadable; merging over empty");
            RegistrySnapshot::default()
        }
    };
    let merged = registry.merge_into_overlay(base);
    if let Err(err) = store.write(&merged) {
        warn!(error = %err, "snapshot write failed; state not persisted");
    }
}

/// Load the overlay for engine startup, degrading failures to empty.
pub fn load_overlay<S: StateStore>(store: &S) -> RegistrySnapshot {
    match store.read() {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => RegistrySnapshot::default(),
        Err(err) => {
            warn!(error = %err, "persisted snapshot unreadable; starting empty");
            RegistrySnapshot::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use wayfare_core::state::{State, StateId};

    fn state(id: &str, url: &str) -> State {
        State {
            id: StateId::from(id),
            data: Value::Null,
            title: String::new(),
            url: url.to_owned(),
            hash: url.to_owned(),
            hashed_url: url.to_owned(),
        }
    }

    #[test]
    fn sync_persists_live_entries() {
        let mut registry = StateRegistry::new();
        registry.record(&state("1", "https://x/a"));
        let mut store = MemoryStore::new();

        sync(&registry, &mut store);

        let snapshot = store.snapshot().expect("snapshot written");
        assert!(snapshot.id_to_state.contains_key(&StateId::from("1")));
    }

    #[test]
    fn sync_preserves_foreign_entries() {
        let mut base = RegistrySnapshot::default();
        let other = state("9", "https://x/other");
        base.id_to_state.insert(other.id.clone(), other.clone());
        let mut store = MemoryStore::seeded(base);

        let mut registry = StateRegistry::new();
        registry.record(&state("1", "https://x/a"));
        sync(&registry, &mut store);

        let snapshot = store.snapshot().unwrap();
        assert!(snapshot.id_to_state.contains_key(&other.id));
        assert!(snapshot.id_to_state.contains_key(&StateId::from("1")));
    }

    #[test]
    fn sync_is_idempotent() {
        let mut registry = StateRegistry::new();
        registry.record(&state("1", "https://x/a"));
        let mut store = MemoryStore::new();

        sync(&registry, &mut store);
        let first = store.snapshot().cloned();
        sync(&registry, &mut store);
        assert_eq!(store.snapshot().cloned(), first);
        assert_eq!(store.writes, 2);
    }

    #[test]
    fn file_store_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("store.json"));

        let mut registry = StateRegistry::new();
        registry.record(&state("1", "https://x/a"));
        sync(&registry, &mut store);

        let loaded = store.read().unwrap().expect("snapshot present");
        assert!(loaded.id_to_state.contains_key(&StateId::from("1")));
    }

    #[test]
    fn missing_file_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().join("absent.json"));
        assert!(store.read().unwrap().is_none());
    }

    #[test]
    fn corrupt_file_degrades_to_empty_overlay() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "not json {{{").unwrap();

        let store = FileStore::new(&path);
        assert!(store.read().is_err());
        assert!(load_overlay(&store).is_empty());
    }

    #[test]
    fn version_mismatch_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("future.json");
        std::fs::write(
            &path,
            serde_json::json!({ "version": 999, "snapshot": {} }).to_string(),
        )
        .unwrap();

        let store = FileStore::new(&path);
        let err = store.read().unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn atomic_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let mut store = FileStore::new(&path);
        store.write(&RegistrySnapshot::default()).unwrap();

        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[test]
    fn corrupt_store_still_accepts_sync() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "garbage").unwrap();
        let mut store = FileStore::new(&path);

        let mut registry = StateRegistry::new();
        registry.record(&state("1", "https://x/a"));
        sync(&registry, &mut store);

        let reloaded = store.read().unwrap().expect("rewritten snapshot");
        assert!(reloaded.id_to_state.contains_key(&StateId::from("1")));
    }
}
