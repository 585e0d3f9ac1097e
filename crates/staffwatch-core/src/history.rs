//! History source trait.
//!
//! The reconciliation engine only needs one thing from the outside world
//! while it runs: the audit history of records whose timestamp moved. The
//! [`HistorySource`] trait abstracts where that history comes from -- the
//! catalog's REST API in production, a scripted map in tests.

use std::future::Future;

use staffwatch_types::{HistoryEvent, RecordId};

/// Errors that can occur while fetching a record's history.
///
/// Every variant is recoverable from the engine's point of view: the
/// record is left unacknowledged and retried on the next pass.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// The request could not be sent or returned a non-success status.
    #[error("history transport error: {message}")]
    Transport {
        /// Description of the failure.
        message: String,
    },

    /// The response body did not have the expected shape.
    #[error("malformed history response: {message}")]
    Malformed {
        /// Description of the failure.
        message: String,
    },

    /// The fetch did not complete within the configured deadline.
    #[error("history fetch timed out after {after_ms}ms")]
    Timeout {
        /// The deadline in milliseconds.
        after_ms: u64,
    },
}

/// A source of per-record audit history.
pub trait HistorySource {
    /// Fetch the audit history of one record, oldest entry first.
    ///
    /// `since` is the last acknowledged timestamp for the record. It is a
    /// hint only: implementations may return older entries, and the engine
    /// filters them out itself. An empty list is a valid answer meaning no
    /// recorded changes are available.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError`] if the history could not be obtained.
    fn fetch_history(
        &self,
        id: &RecordId,
        since: Option<&str>,
    ) -> impl Future<Output = Result<Vec<HistoryEvent>, HistoryError>> + Send;
}
