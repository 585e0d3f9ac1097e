//! Error types for the change monitor.
//!
//! Uses `thiserror` for typed errors that surface through the pass
//! pipeline: catalog and history calls, snapshot persistence, and the
//! notification webhook.

use std::time::Duration;

use staffwatch_core::history::HistoryError;

/// Errors talking to the Insight REST API.
#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Client(String),

    /// The request could not be sent or the connection failed.
    #[error("Insight request to {url} failed: {message}")]
    Transport {
        /// Requested URL.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// The request exceeded its deadline.
    #[error("Insight request to {url} timed out")]
    Timeout {
        /// Requested URL.
        url: String,
    },

    /// The API answered with a non-success status.
    #[error("Insight returned {status} for {url}: {body}")]
    Status {
        /// Requested URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },

    /// The response body did not have the expected shape.
    #[error("Insight response from {url} could not be parsed: {message}")]
    Malformed {
        /// Requested URL.
        url: String,
        /// Description of the parse failure.
        message: String,
    },
}

impl InsightError {
    /// Classify a `reqwest` send failure.
    pub fn from_send(url: &str, error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_owned(),
            }
        } else {
            Self::Transport {
                url: url.to_owned(),
                message: error.to_string(),
            }
        }
    }
}

impl InsightError {
    /// Classify a failed history request for the reconciliation engine.
    ///
    /// `deadline` is the per-request history timeout the request ran with.
    pub fn into_history_error(self, deadline: Duration) -> HistoryError {
        match self {
            Self::Timeout { .. } => HistoryError::Timeout {
                after_ms: u64::try_from(deadline.as_millis()).unwrap_or(u64::MAX),
            },
            Self::Malformed { .. } => HistoryError::Malformed {
                message: self.to_string(),
            },
            Self::Client(_) | Self::Transport { .. } | Self::Status { .. } => {
                HistoryError::Transport {
                    message: self.to_string(),
                }
            }
        }
    }
}

/// Errors reading or writing the persisted snapshot.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Filesystem failure.
    #[error("snapshot I/O error on {path}: {source}")]
    Io {
        /// Snapshot file path.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The snapshot file is not a valid JSON record list, or the snapshot
    /// could not be encoded.
    #[error("snapshot serde error on {path}: {source}")]
    Serde {
        /// Snapshot file path.
        path: String,
        /// The underlying serde error.
        source: serde_json::Error,
    },
}

/// Errors delivering a notification. Logged, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The webhook could not be reached.
    #[error("webhook request failed: {0}")]
    Transport(String),

    /// The webhook answered with a non-success status.
    #[error("webhook returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, for diagnostics.
        body: String,
    },
}

/// Whole-pass failures. Per-record problems never reach this level.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    /// The current catalog could not be fetched. Nothing was reported.
    #[error("catalog fetch failed: {source}")]
    Catalog {
        /// The underlying catalog error.
        #[from]
        source: InsightError,
    },

    /// The previous snapshot could not be loaded. Nothing was reported.
    #[error("snapshot load failed: {source}")]
    LoadSnapshot {
        /// The underlying store error.
        source: StoreError,
    },

    /// The initial baseline could not be written.
    #[error("baseline save failed: {source}")]
    Baseline {
        /// The underlying store error.
        source: StoreError,
    },

    /// Changes were reported but the new snapshot was not persisted, so
    /// the next pass may report them again.
    #[error("{reported} changes reported but snapshot not saved: {source}")]
    SaveSnapshot {
        /// Number of change events already sent.
        reported: usize,
        /// The underlying store error.
        source: StoreError,
    },
}
