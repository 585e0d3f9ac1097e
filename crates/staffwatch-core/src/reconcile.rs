//! The reconciliation pass: previous snapshot + current snapshot -> changes.
//!
//! One pass walks the freshly fetched snapshot in catalog order and
//! classifies every record against the previously persisted one:
//!
//! 1. **New id** -- reported as created and added to the working snapshot.
//! 2. **Same timestamp** -- nothing happened, the stored record is untouched.
//! 3. **Timestamp moved** -- the record's audit history is fetched and the
//!    entries newer than the stored timestamp (the record's *watermark*)
//!    become the reported field changes. The watermark then advances to
//!    the current timestamp so the same entries are never reported twice.
//!
//! Ids left in the working snapshot that the catalog no longer returns are
//! then reported as deleted and dropped.
//!
//! History fetches for different records run concurrently (bounded by
//! [`ReconcileOptions::max_concurrent_fetches`]) but their results are
//! consumed in catalog order, so the event sequence is deterministic.
//!
//! A failing or timed-out history fetch never aborts the pass. The record
//! keeps its old watermark, which makes the next pass try again.

use std::time::Duration;

use futures::StreamExt;
use staffwatch_types::{ChangeEvent, FieldChange, HistoryEvent, Record, RecordId, Snapshot, UNKNOWN};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::history::{HistoryError, HistorySource};

/// Default number of history fetches allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;

/// Default deadline for a single history fetch.
pub const DEFAULT_HISTORY_TIMEOUT: Duration = Duration::from_secs(15);

/// Tuning knobs for a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOptions {
    /// Maximum number of history fetches in flight at once (at least 1).
    pub max_concurrent_fetches: usize,
    /// Deadline for each history fetch. Exceeding it counts as a failure.
    pub history_timeout: Duration,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
            history_timeout: DEFAULT_HISTORY_TIMEOUT,
        }
    }
}

impl ReconcileOptions {
    fn concurrency(&self) -> usize {
        self.max_concurrent_fetches.max(1)
    }
}

/// Per-pass counters, logged by the caller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    /// Records reported as created.
    pub created: u32,
    /// Records reported as updated.
    pub updated: u32,
    /// Records reported as deleted.
    pub deleted: u32,
    /// Records whose timestamp did not move.
    pub unchanged: u32,
    /// Records whose history fetch failed (retried next pass).
    pub failed: u32,
    /// Records whose timestamp moved but whose history held nothing new.
    /// Their watermark advances.
    pub suppressed: u32,
    /// Records whose timestamp moved but whose history came back empty.
    /// Their watermark stays put, so the next pass looks again.
    pub empty_history: u32,
}

/// Result of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// Changes in report order: current-snapshot order, deletions last.
    pub events: Vec<ChangeEvent>,
    /// The snapshot to persist for the next pass.
    pub snapshot: Snapshot,
    /// Counters for this pass.
    pub summary: ReconcileSummary,
}

/// What to do with one record of the current snapshot.
enum Step<'a> {
    Create(&'a Record),
    Unchanged,
    Fetch {
        record: &'a Record,
        watermark: Option<String>,
    },
}

/// A [`Step`] after its history fetch (if any) completed.
enum Resolved<'a> {
    Created(&'a Record),
    Unchanged,
    Fetched {
        record: &'a Record,
        watermark: Option<String>,
        outcome: Result<Vec<HistoryEvent>, HistoryError>,
    },
}

/// How a fetched history bears on an updated record.
#[derive(Debug, PartialEq, Eq)]
enum Verdict {
    /// No history at all. The watermark stays put.
    Empty,
    /// History exists but nothing is newer than the watermark.
    Stale,
    /// History holds reportable changes.
    Changed(ChangeEvent),
}

/// Reconcile `previous` against `current`.
///
/// `previous` becomes the working snapshot: created records are inserted,
/// acknowledged updates move their timestamp forward, deleted records are
/// removed. Records whose history fetch failed keep their old timestamp.
pub async fn reconcile<H: HistorySource>(
    previous: Snapshot,
    current: &Snapshot,
    history: &H,
    options: &ReconcileOptions,
) -> Reconciliation {
    let deadline = options.history_timeout;

    let steps: Vec<Step<'_>> = current
        .records()
        .map(|record| plan(&previous, record))
        .collect();

    let resolved: Vec<Resolved<'_>> = futures::stream::iter(steps)
        .map(|step| resolve(step, history, deadline))
        .buffered(options.concurrency())
        .collect()
        .await;

    let mut working = previous;
    let mut events = Vec::new();
    let mut summary = ReconcileSummary::default();

    for step in resolved {
        match step {
            Resolved::Created(record) => {
                debug!(id = %record.id, label = record.label, "record created");
                events.push(ChangeEvent::Created {
                    id: record.id.clone(),
                    label: record.label.clone(),
                });
                working.insert(record.clone());
                summary.created = summary.created.saturating_add(1);
            }
            Resolved::Unchanged => {
                summary.unchanged = summary.unchanged.saturating_add(1);
            }
            Resolved::Fetched {
                record,
                outcome: Err(e),
                ..
            } => {
                warn!(
                    id = %record.id,
                    label = record.label,
                    error = %e,
                    "history fetch failed, record left unacknowledged"
                );
                summary.failed = summary.failed.saturating_add(1);
            }
            Resolved::Fetched {
                record,
                watermark,
                outcome: Ok(entries),
            } => match assess(record, watermark.as_deref(), &entries) {
                Verdict::Empty => {
                    debug!(id = %record.id, "timestamp moved but history is empty");
                    summary.empty_history = summary.empty_history.saturating_add(1);
                }
                Verdict::Stale => {
                    debug!(
                        id = %record.id,
                        watermark = watermark.as_deref().unwrap_or_default(),
                        "no history newer than watermark"
                    );
                    working.set_last_modified(&record.id, record.last_modified.clone());
                    summary.suppressed = summary.suppressed.saturating_add(1);
                }
                Verdict::Changed(event) => {
                    debug!(id = %record.id, label = record.label, "record updated");
                    events.push(event);
                    working.set_last_modified(&record.id, record.last_modified.clone());
                    summary.updated = summary.updated.saturating_add(1);
                }
            },
        }
    }

    let gone: Vec<RecordId> = working
        .ids()
        .filter(|id| !current.contains(id))
        .cloned()
        .collect();
    for id in gone {
        if let Some(record) = working.remove(&id) {
            debug!(id = %record.id, label = record.label, "record deleted");
            events.push(ChangeEvent::Deleted {
                id: record.id,
                label: record.label,
            });
            summary.deleted = summary.deleted.saturating_add(1);
        }
    }

    info!(
        created = summary.created,
        updated = summary.updated,
        deleted = summary.deleted,
        unchanged = summary.unchanged,
        failed = summary.failed,
        suppressed = summary.suppressed,
        empty_history = summary.empty_history,
        "reconciliation complete"
    );

    Reconciliation {
        events,
        snapshot: working,
        summary,
    }
}

fn plan<'a>(previous: &Snapshot, record: &'a Record) -> Step<'a> {
    match previous.get(&record.id) {
        None => Step::Create(record),
        Some(stored) if stored.last_modified == record.last_modified => Step::Unchanged,
        Some(stored) => Step::Fetch {
            record,
            watermark: stored.last_modified.clone(),
        },
    }
}

async fn resolve<'a, H: HistorySource>(
    step: Step<'a>,
    history: &H,
    deadline: Duration,
) -> Resolved<'a> {
    match step {
        Step::Create(record) => Resolved::Created(record),
        Step::Unchanged => Resolved::Unchanged,
        Step::Fetch { record, watermark } => {
            let outcome = match timeout(
                deadline,
                history.fetch_history(&record.id, watermark.as_deref()),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(HistoryError::Timeout {
                    after_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
                }),
            };
            Resolved::Fetched {
                record,
                watermark,
                outcome,
            }
        }
    }
}

/// Decide what a record's history means given its watermark.
///
/// Only entries strictly newer than the watermark are reported. A missing
/// watermark sorts before every real timestamp. Actor and time come from
/// the last entry of the full history, not the last reported one.
fn assess(record: &Record, watermark: Option<&str>, entries: &[HistoryEvent]) -> Verdict {
    let Some(latest) = entries.last() else {
        return Verdict::Empty;
    };

    let field_changes: Vec<FieldChange> = entries
        .iter()
        .filter(|e| watermark.is_none_or(|w| e.created_at.as_str() > w))
        .map(FieldChange::from_event)
        .collect();

    if field_changes.is_empty() {
        return Verdict::Stale;
    }

    Verdict::Changed(ChangeEvent::Updated {
        id: record.id.clone(),
        label: record.label.clone(),
        actor: latest
            .actor_name
            .clone()
            .unwrap_or_else(|| UNKNOWN.to_owned()),
        occurred_at: latest.created_at.clone(),
        field_changes,
    })
}
