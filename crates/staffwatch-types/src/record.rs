//! Tracked records and the snapshots that hold them.
//!
//! A [`Snapshot`] maps each [`RecordId`] to its [`Record`] and preserves
//! insertion order, so iterating a freshly fetched snapshot visits records
//! in the order the catalog returned them. Snapshots serialize as a plain
//! JSON array of records, which is also the on-disk layout.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::ids::RecordId;

/// One tracked entity as observed in the catalog.
///
/// A missing or empty label reads back as `object_{id}`, so one damaged
/// entry cannot make a whole snapshot unreadable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "WireRecord")]
pub struct Record {
    /// Catalog identifier.
    pub id: RecordId,
    /// Human-readable label (e.g. the employee's name).
    pub label: String,
    /// Last-modified timestamp as reported by the catalog.
    ///
    /// Named `updated` on the wire and on disk.
    #[serde(rename = "updated", default)]
    pub last_modified: Option<String>,
}

impl Record {
    /// Create a record.
    pub fn new(
        id: impl Into<RecordId>,
        label: impl Into<String>,
        last_modified: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            last_modified,
        }
    }

    /// Label used for a record that has none.
    pub fn fallback_label(id: &RecordId) -> String {
        format!("object_{id}")
    }
}

/// A record as found on the wire or on disk, label optional.
#[derive(Deserialize)]
struct WireRecord {
    id: RecordId,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    updated: Option<String>,
}

impl From<WireRecord> for Record {
    fn from(wire: WireRecord) -> Self {
        let label = match wire.label {
            Some(label) if !label.is_empty() => label,
            _ => Self::fallback_label(&wire.id),
        };
        Self {
            id: wire.id,
            label,
            last_modified: wire.updated,
        }
    }
}

/// The complete set of records as last observed, keyed by id.
///
/// Every key equals the id of the record stored under it; all mutation
/// goes through methods that maintain that invariant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "Vec<Record>")]
pub struct Snapshot {
    records: IndexMap<RecordId, Record>,
}

impl Snapshot {
    /// Create an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a list of records into a snapshot.
    ///
    /// When an id appears more than once the last record wins, while the
    /// id keeps the position of its first occurrence.
    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut snapshot = Self::new();
        for record in records {
            snapshot.insert(record);
        }
        snapshot
    }

    /// Look up a record by id.
    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.records.get(id)
    }

    /// Whether a record with this id is present.
    pub fn contains(&self, id: &RecordId) -> bool {
        self.records.contains_key(id)
    }

    /// Insert or replace a record, returning the previous one.
    pub fn insert(&mut self, record: Record) -> Option<Record> {
        self.records.insert(record.id.clone(), record)
    }

    /// Remove a record, keeping the order of the remaining ones.
    pub fn remove(&mut self, id: &RecordId) -> Option<Record> {
        self.records.shift_remove(id)
    }

    /// Overwrite the stored timestamp of a record.
    ///
    /// Returns `false` if no record with this id exists.
    pub fn set_last_modified(&mut self, id: &RecordId, last_modified: Option<String>) -> bool {
        match self.records.get_mut(id) {
            Some(record) => {
                record.last_modified = last_modified;
                true
            }
            None => false,
        }
    }

    /// Iterate over the ids in order.
    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.records.keys()
    }

    /// Iterate over the records in order.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the snapshot holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl From<Vec<Record>> for Snapshot {
    fn from(records: Vec<Record>) -> Self {
        Self::from_records(records)
    }
}

impl FromIterator<Record> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self::from_records(iter)
    }
}

impl Serialize for Snapshot {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_seq(self.records.values())
    }
}
