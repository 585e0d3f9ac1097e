//! Pass orchestration and the scheduling loop.
//!
//! One pass loads the previous snapshot, fetches the current catalog,
//! reconciles the two, reports every change in order, and persists the
//! result. The very first pass has no previous snapshot: it saves the
//! catalog as a baseline and reports nothing for it.
//!
//! Passes never overlap. In scheduled mode a failed pass is logged and the
//! next one starts at the following tick.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use staffwatch_core::config::StaffwatchConfig;
use staffwatch_core::reconcile::{ReconcileOptions, ReconcileSummary, Reconciliation, reconcile};
use tokio::time::MissedTickBehavior;
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

use crate::error::{InsightError, PassError};
use crate::insight::InsightClient;
use crate::notify::Notifier;
use crate::render::Renderer;
use crate::store::{FileSnapshotStore, SnapshotStore};

/// Outcome of one successful pass.
#[derive(Debug, Clone)]
pub struct PassReport {
    /// Correlation id carried by every log line of the pass.
    pub run_id: Uuid,
    /// When the pass started.
    pub started_at: DateTime<Utc>,
    /// When the pass finished.
    pub finished_at: DateTime<Utc>,
    /// Whether this pass had to create the initial baseline.
    pub baseline_created: bool,
    /// Reconciliation counters.
    pub summary: ReconcileSummary,
    /// Number of change events handed to the notifier.
    pub notified: usize,
}

/// The change monitor: catalog, snapshot store and notifier wired together.
pub struct Monitor<S> {
    insight: InsightClient,
    store: S,
    notifier: Notifier,
    renderer: Renderer,
    options: ReconcileOptions,
}

impl Monitor<FileSnapshotStore> {
    /// Build a monitor backed by the snapshot file named in the config.
    ///
    /// # Errors
    ///
    /// Returns [`InsightError::Client`] if the HTTP client cannot be built.
    pub fn from_config(config: &StaffwatchConfig) -> Result<Self, InsightError> {
        let insight = InsightClient::new(&config.insight)?;
        let notifier = Notifier::from_config(&config.notify, insight.http_client());
        Ok(Self::new(
            insight,
            FileSnapshotStore::new(&config.store.snapshot_path),
            notifier,
            Renderer::from_config(&config.insight),
            config.reconcile_options(),
        ))
    }
}

impl<S: SnapshotStore> Monitor<S> {
    /// Wire a monitor from its parts.
    pub const fn new(
        insight: InsightClient,
        store: S,
        notifier: Notifier,
        renderer: Renderer,
        options: ReconcileOptions,
    ) -> Self {
        Self {
            insight,
            store,
            notifier,
            renderer,
            options,
        }
    }

    /// Name of the configured notifier, for startup logging.
    pub const fn notifier_name(&self) -> &str {
        self.notifier.name()
    }

    /// Run one pass.
    ///
    /// # Errors
    ///
    /// Returns [`PassError`] when the catalog cannot be fetched or the
    /// snapshot cannot be loaded or saved. Per-record history failures are
    /// not errors; those records are retried on the next pass.
    pub async fn run_pass(&self) -> Result<PassReport, PassError> {
        let run_id = Uuid::now_v7();
        let span = info_span!("pass", %run_id);
        self.pass(run_id).instrument(span).await
    }

    async fn pass(&self, run_id: Uuid) -> Result<PassReport, PassError> {
        let started_at = Utc::now();
        info!("pass started");

        let loaded = self
            .store
            .load()
            .map_err(|source| PassError::LoadSnapshot { source })?;

        let (previous, baseline_created) = match loaded {
            Some(snapshot) => (snapshot, false),
            None => {
                info!("no previous snapshot, initial run: saving baseline");
                let baseline = self.insight.fetch_all().await?;
                self.store
                    .save(&baseline)
                    .map_err(|source| PassError::Baseline { source })?;
                info!(records = baseline.len(), "baseline saved");
                (baseline, true)
            }
        };

        let current = self.insight.fetch_all().await?;

        let Reconciliation {
            events,
            snapshot,
            summary,
        } = reconcile(previous, &current, &self.insight, &self.options).await;

        for event in &events {
            info!(
                kind = %event.kind(),
                id = %event.id(),
                label = event.label(),
                "change detected"
            );
            self.notifier.notify(&self.renderer.render(event)).await;
        }

        if let Err(source) = self.store.save(&snapshot) {
            error!(
                reported = events.len(),
                error = %source,
                "changes reported but snapshot not saved"
            );
            return Err(PassError::SaveSnapshot {
                reported: events.len(),
                source,
            });
        }

        let finished_at = Utc::now();
        info!(
            created = summary.created,
            updated = summary.updated,
            deleted = summary.deleted,
            unchanged = summary.unchanged,
            failed = summary.failed,
            suppressed = summary.suppressed,
            empty_history = summary.empty_history,
            records = snapshot.len(),
            elapsed_ms = finished_at
                .signed_duration_since(started_at)
                .num_milliseconds(),
            "pass complete"
        );

        Ok(PassReport {
            run_id,
            started_at,
            finished_at,
            baseline_created,
            summary,
            notified: events.len(),
        })
    }

    /// Run a pass every `period` until `shutdown` resolves.
    ///
    /// The first pass starts immediately. A pass that overruns the period
    /// delays the next tick instead of bunching passes up. Shutdown is
    /// checked between passes, so a pass in progress always completes.
    ///
    /// Returns the number of passes attempted.
    pub async fn run_every(&self, period: Duration, shutdown: impl Future<Output = ()>) -> u64 {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        let mut passes: u64 = 0;
        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!(passes, "shutdown requested, stopping");
                    break;
                }
                _ = ticker.tick() => {}
            }

            passes = passes.saturating_add(1);
            match self.run_pass().await {
                Ok(report) => info!(
                    run_id = %report.run_id,
                    notified = report.notified,
                    "scheduled pass succeeded"
                ),
                Err(e) => error!(error = %e, "scheduled pass failed, retrying at next tick"),
            }
        }
        passes
    }
}
