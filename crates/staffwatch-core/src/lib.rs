//! Configuration and the change-detection engine for staffwatch.
//!
//! This crate owns the only stateful logic in the system: reconciling the
//! last persisted [`Snapshot`] against a freshly fetched one and deciding,
//! record by record, what was created, updated, or deleted since the last
//! run.
//!
//! # Modules
//!
//! - [`config`] -- Configuration loading from `staffwatch.yaml` (plus
//!   environment overrides) into strongly-typed structs.
//! - [`history`] -- [`HistorySource`] trait through which the engine reads
//!   per-record audit history.
//! - [`reconcile`] -- The reconciliation pass itself.
//!
//! [`Snapshot`]: staffwatch_types::Snapshot
//! [`HistorySource`]: history::HistorySource

pub mod config;
pub mod history;
pub mod reconcile;
