//! Change events emitted by a reconciliation pass.

use crate::history::FieldChange;
use crate::ids::RecordId;

/// Kind of change detected for a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// The record appeared in the catalog.
    Created,
    /// One or more attributes of the record changed.
    Updated,
    /// The record disappeared from the catalog.
    Deleted,
}

impl ChangeKind {
    /// Upper-case tag used in notifications.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Deleted => "DELETED",
        }
    }
}

impl core::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified change for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A record not present in the previous snapshot.
    Created {
        /// Record id.
        id: RecordId,
        /// Record label.
        label: String,
    },
    /// A record whose history holds changes newer than its watermark.
    Updated {
        /// Record id.
        id: RecordId,
        /// Record label.
        label: String,
        /// Who made the most recent change in the fetched history.
        actor: String,
        /// When the most recent change in the fetched history happened.
        occurred_at: String,
        /// Reportable changes, oldest first.
        field_changes: Vec<FieldChange>,
    },
    /// A record present before but missing from the catalog now.
    Deleted {
        /// Record id.
        id: RecordId,
        /// Label as last stored in the snapshot.
        label: String,
    },
}

impl ChangeEvent {
    /// The kind of this change.
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Created { .. } => ChangeKind::Created,
            Self::Updated { .. } => ChangeKind::Updated,
            Self::Deleted { .. } => ChangeKind::Deleted,
        }
    }

    /// Id of the affected record.
    pub const fn id(&self) -> &RecordId {
        match self {
            Self::Created { id, .. } | Self::Updated { id, .. } | Self::Deleted { id, .. } => id,
        }
    }

    /// Label of the affected record.
    pub fn label(&self) -> &str {
        match self {
            Self::Created { label, .. }
            | Self::Updated { label, .. }
            | Self::Deleted { label, .. } => label,
        }
    }
}
