//! Deletion pipeline orchestrator.
//!
//! Wires the stages together for a single pass:
//!
//! ```text
//! SelectionCriteria → QueryBuilder → ObjectLister → BulkDeleter → summary
//! ```
//!
//! Listing completes before the first delete is issued. An empty match set
//! ends the run without touching the deleter.

use anyhow::{Context, Result};
use async_channel::Receiver;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::deleter::BulkDeleter;
use crate::lister::ObjectLister;
use crate::query::{QueryBuilder, format_timestamp};
use crate::storage::{self, Storage};
use crate::types::error::GdrmError;
use crate::types::{DeletionReport, DeletionStatistics};

/// How a run ended when no fatal error occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The listing matched nothing; no delete was issued.
    NothingToDelete,
    /// Deletion ran for every matched object.
    Completed(DeletionReport),
}

impl RunOutcome {
    /// 0 when nothing matched or everything was deleted, 3 when any object
    /// failed.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::NothingToDelete => 0,
            RunOutcome::Completed(report) if report.has_failure() => GdrmError::PartialFailure {
                deleted: report.deleted_count(),
                failed: report.failed_count(),
            }
            .exit_code(),
            RunOutcome::Completed(_) => 0,
        }
    }

    pub fn report(&self) -> Option<&DeletionReport> {
        match self {
            RunOutcome::NothingToDelete => None,
            RunOutcome::Completed(report) => Some(report),
        }
    }
}

/// The deletion pipeline orchestrator.
///
/// ## Usage
///
/// ```no_run
/// # async fn example() -> anyhow::Result<()> {
/// use gdrm_rs::{Config, DeletionPipeline};
///
/// let config = Config::try_from(gdrm_rs::config::args::parse_from_args(vec![
///     "gdrm",
///     "1AbCdEfGh",
/// ])?)
/// .map_err(anyhow::Error::msg)?;
///
/// let pipeline = DeletionPipeline::new(config).await?;
/// pipeline.close_stats_sender();
/// let outcome = pipeline.run().await?;
/// std::process::exit(outcome.exit_code());
/// # }
/// ```
pub struct DeletionPipeline {
    config: Config,
    target: Storage,
    stats_receiver: Receiver<DeletionStatistics>,
}

impl DeletionPipeline {
    /// Create a pipeline backed by Drive.
    ///
    /// Loads the service-account credential; failure to do so is fatal.
    pub async fn new(config: Config) -> Result<Self> {
        let (stats_sender, stats_receiver) = async_channel::unbounded();

        let target = storage::create_storage(config.clone(), stats_sender)
            .await
            .context("failed to initialize Drive storage.")?;

        Ok(Self {
            config,
            target,
            stats_receiver,
        })
    }

    /// Create a pipeline over an existing storage.
    ///
    /// `stats_receiver` must be the receiving end of the channel whose sender
    /// the storage returns from `get_stats_sender()`.
    pub fn with_storage(
        config: Config,
        target: Storage,
        stats_receiver: Receiver<DeletionStatistics>,
    ) -> Self {
        Self {
            config,
            target,
            stats_receiver,
        }
    }

    /// Run the pipeline with the current time as the window reference.
    pub async fn run(&self) -> Result<RunOutcome> {
        self.run_at(Utc::now()).await
    }

    /// Run the pipeline with `now` as the window reference.
    ///
    /// Invalid criteria, listing failures and pipeline failures are returned
    /// as errors wrapping [`GdrmError`](crate::types::error::GdrmError).
    /// Per-object failures are carried in the report instead.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<RunOutcome> {
        let criteria = self.config.selection_criteria(now)?;
        let query = QueryBuilder::build_from_criteria(&criteria)?;

        info!(
            container_id = criteria.container_id(),
            modified_after = %format_timestamp(criteria.window().start()),
            modified_before = %format_timestamp(criteria.window().end()),
            "Searching for files to delete."
        );

        let lister = ObjectLister::new(
            dyn_clone::clone_box(&*self.target),
            self.config.page_size,
        );
        let matches = lister.list(&query).await?;

        if matches.is_empty() {
            info!("No files matched. Nothing to delete.");
            return Ok(RunOutcome::NothingToDelete);
        }

        info!(objects = matches.len(), "Found {} files to delete.", matches.len());

        let deleter = BulkDeleter::new(self.config.clone(), dyn_clone::clone_box(&*self.target));
        let report = deleter.delete_all(matches).await?;

        self.log_summary(&report);
        Ok(RunOutcome::Completed(report))
    }

    /// Get the stats receiver for progress reporting.
    pub fn get_stats_receiver(&self) -> Receiver<DeletionStatistics> {
        self.stats_receiver.clone()
    }

    /// Close the stats sender to signal the progress reporter to finish.
    ///
    /// Call this after `run()` when a progress reporter is attached, or
    /// before it if progress is not consumed at all.
    pub fn close_stats_sender(&self) {
        self.target.get_stats_sender().close();
    }

    fn log_summary(&self, report: &DeletionReport) {
        let deleted = report.deleted_count();
        let failed = report.failed_count();

        if failed == 0 {
            info!(deleted, failed, "Deleted {} files.", deleted);
            return;
        }

        for record in report.failures() {
            debug!(file_id = record.id, "{} ({}): {}", record.name, record.id, record.outcome);
        }
        warn!(
            deleted,
            failed,
            "Deleted {} files, {} failed.",
            deleted,
            failed
        );
    }
}
