//! Snapshot persistence between passes.
//!
//! The snapshot is a JSON array of `{id, label, updated}` records. Saves
//! go through a temporary file in the same directory followed by a
//! rename, so a crash mid-write leaves the previous snapshot intact.

use std::io::Write;
use std::path::{Path, PathBuf};

use staffwatch_types::Snapshot;
use tracing::debug;

use crate::error::StoreError;

/// Where the previous snapshot lives.
pub trait SnapshotStore {
    /// Load the last persisted snapshot.
    ///
    /// Returns `Ok(None)` when nothing has been persisted yet.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if a snapshot exists but cannot be read.
    fn load(&self) -> Result<Option<Snapshot>, StoreError>;

    /// Replace the persisted snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the snapshot cannot be written.
    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError>;
}

/// Snapshot stored as a single JSON file.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    path: PathBuf,
}

impl FileSnapshotStore {
    /// Create a store backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            source,
        }
    }

    fn serde_error(&self, source: serde_json::Error) -> StoreError {
        StoreError::Serde {
            path: self.path.display().to_string(),
            source,
        }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn load(&self) -> Result<Option<Snapshot>, StoreError> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(self.io_error(e)),
        };

        let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| self.serde_error(e))?;
        debug!(path = %self.path.display(), records = snapshot.len(), "snapshot loaded");
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut file = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.io_error(e))?;
        serde_json::to_writer_pretty(&mut file, snapshot).map_err(|e| self.serde_error(e))?;
        file.write_all(b"\n").map_err(|e| self.io_error(e))?;
        file.as_file().sync_all().map_err(|e| self.io_error(e))?;
        file.persist(&self.path)
            .map_err(|e| self.io_error(e.error))?;

        debug!(path = %self.path.display(), records = snapshot.len(), "snapshot saved");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use staffwatch_types::{Record, RecordId};

    use super::*;

    fn sample() -> Snapshot {
        Snapshot::from_records(vec![
            Record::new(2u64, "Bob", Some("2024-01-01T00:00:00".to_owned())),
            Record::new(1u64, "Alice", None),
        ])
    }

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("employees.json"));

        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn save_then_load_preserves_records_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("employees.json"));

        store.save(&sample()).unwrap();
        let loaded = store.load().unwrap().unwrap();

        assert_eq!(loaded, sample());
        let ids: Vec<&str> = loaded.ids().map(RecordId::as_str).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[test]
    fn save_writes_a_json_array_of_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("employees.json");
        let store = FileSnapshotStore::new(&path);

        store.save(&sample()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!([
                {"id": 2, "label": "Bob", "updated": "2024-01-01T00:00:00"},
                {"id": 1, "label": "Alice", "updated": null}
            ])
        );
    }

    #[test]
    fn save_replaces_previous_snapshot_without_leftovers() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("employees.json"));

        store.save(&sample()).unwrap();
        store.save(&Snapshot::new()).unwrap();

        assert!(store.load().unwrap().unwrap().is_empty());
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1, "temporary files must not be left behind");
    }

    #[test]
    fn corrupt_file_is_a_serde_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("employees.json");
        std::fs::write(&path, "{not json").unwrap();

        let result = FileSnapshotStore::new(&path).load();
        assert!(matches!(result, Err(StoreError::Serde { .. })));
    }

    #[test]
    fn entry_without_label_still_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("employees.json");
        std::fs::write(
            &path,
            r#"[{"id":1,"label":"A","updated":"t"},{"id":2,"updated":"t"}]"#,
        )
        .unwrap();

        let loaded = FileSnapshotStore::new(&path).load().unwrap().unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.get(&RecordId::from("2")).unwrap().label, "object_2");
    }

    #[test]
    fn save_into_missing_directory_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::new(dir.path().join("missing").join("employees.json"));

        let result = store.save(&sample());
        assert!(matches!(result, Err(StoreError::Io { .. })));
    }
}
