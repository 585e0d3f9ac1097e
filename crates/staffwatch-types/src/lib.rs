//! Shared type definitions for staffwatch.
//!
//! This crate is the single source of truth for the data that flows
//! between the reconciliation engine and its collaborators: the records
//! fetched from the object catalog, the snapshots persisted between runs,
//! the per-record audit history, and the change events the engine emits.
//!
//! # Modules
//!
//! - [`ids`] -- Record identifier newtype (numeric-or-string on the wire)
//! - [`record`] -- [`Record`] and the id-keyed, insertion-ordered [`Snapshot`]
//! - [`history`] -- Audit history events and the field changes built from them
//! - [`change`] -- Classified change events emitted by a reconciliation pass

pub mod change;
pub mod history;
pub mod ids;
pub mod record;

// Re-export all public types at crate root for convenience.
pub use change::{ChangeEvent, ChangeKind};
pub use history::{ATTRIBUTE_PLACEHOLDER, FieldChange, HistoryEvent, UNKNOWN, VALUE_PLACEHOLDER};
pub use ids::RecordId;
pub use record::{Record, Snapshot};
