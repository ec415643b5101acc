//! Deletion components for the gdrm-rs pipeline.
//!
//! [`BulkDeleter`] fans a match set out to a fixed pool of [`ObjectDeleter`]
//! workers over a bounded MPMC queue and collects their outcomes through the
//! [`Terminator`](crate::terminator::Terminator).

use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::stage::{SendResult, Stage};
use crate::storage::Storage;
use crate::terminator::Terminator;
use crate::types::error::{GdrmError, is_not_found_on_delete_error};
use crate::types::{
    DeletionOutcome, DeletionRecord, DeletionReport, DeletionStatistics, DriveObject, MatchSet,
};

#[cfg(test)]
mod tests;

const WORKER_TERMINATED_REASON: &str = "deletion worker terminated before reporting an outcome";

// ---------------------------------------------------------------------------
// ObjectDeleter worker
// ---------------------------------------------------------------------------

/// Pipeline worker that reads objects from the shared queue and deletes them
/// one at a time.
///
/// Every received object yields exactly one [`DeletionRecord`]. A failure is
/// recorded and the worker moves on to the next object.
pub struct ObjectDeleter {
    worker_index: u16,
    base: Stage,
    operation_timeout: Duration,
}

impl ObjectDeleter {
    pub fn new(base: Stage, worker_index: u16) -> Self {
        let operation_timeout = Duration::from_millis(base.config.operation_timeout_milliseconds);
        Self {
            worker_index,
            base,
            operation_timeout,
        }
    }

    /// Main entry point: read objects from the queue until it is closed.
    pub async fn delete(&mut self) -> Result<()> {
        debug!(worker_index = self.worker_index, "delete worker started.");

        let Some(receiver) = self.base.receiver.clone() else {
            return Err(anyhow!("delete worker has no input channel."));
        };

        while let Ok(object) = receiver.recv().await {
            let record = self.delete_object(object).await;
            if self.base.send(record).await? == SendResult::Closed {
                warn!(
                    worker_index = self.worker_index,
                    "collector has gone away. delete worker stops."
                );
                return Ok(());
            }
        }

        debug!(
            worker_index = self.worker_index,
            "delete worker has been completed."
        );
        Ok(())
    }

    async fn delete_object(&self, object: DriveObject) -> DeletionRecord {
        info!(
            worker_index = self.worker_index,
            file_id = object.id(),
            "Deleting {} ({})",
            object.name(),
            object.id()
        );

        let result =
            tokio::time::timeout(self.operation_timeout, self.base.target.delete_object(object.id()))
                .await;

        let outcome = match result {
            Ok(Ok(())) => {
                debug!(file_id = object.id(), "deleted.");
                self.base
                    .send_stats(DeletionStatistics::DeleteComplete {
                        id: object.id().to_string(),
                    })
                    .await;
                DeletionOutcome::Deleted
            }
            Ok(Err(e)) if is_not_found_on_delete_error(&e) => {
                info!(
                    file_id = object.id(),
                    "{} ({}) was already gone.",
                    object.name(),
                    object.id()
                );
                self.base
                    .send_stats(DeletionStatistics::DeleteAlreadyAbsent {
                        id: object.id().to_string(),
                    })
                    .await;
                DeletionOutcome::Deleted
            }
            Ok(Err(e)) => {
                let reason = failure_reason(&e);
                warn!(
                    worker_index = self.worker_index,
                    file_id = object.id(),
                    reason = reason,
                    "failed to delete {} ({}).",
                    object.name(),
                    object.id()
                );
                self.base
                    .send_stats(DeletionStatistics::DeleteError {
                        id: object.id().to_string(),
                    })
                    .await;
                DeletionOutcome::Failed(reason)
            }
            Err(_) => {
                let reason = format!(
                    "delete timed out after {} ms",
                    self.operation_timeout.as_millis()
                );
                warn!(
                    worker_index = self.worker_index,
                    file_id = object.id(),
                    reason = reason,
                    "failed to delete {} ({}).",
                    object.name(),
                    object.id()
                );
                self.base
                    .send_stats(DeletionStatistics::DeleteError {
                        id: object.id().to_string(),
                    })
                    .await;
                DeletionOutcome::Failed(reason)
            }
        };

        DeletionRecord {
            id: object.id,
            name: object.name,
            outcome,
        }
    }
}

/// Prefer the typed delete error text; fall back to the whole context chain.
fn failure_reason(e: &anyhow::Error) -> String {
    match e.downcast_ref::<GdrmError>() {
        Some(GdrmError::Delete(reason)) => reason.clone(),
        _ => format!("{:#}", e),
    }
}

// ---------------------------------------------------------------------------
// BulkDeleter
// ---------------------------------------------------------------------------

/// Applies a delete to every object of a match set with bounded concurrency.
///
/// Exactly `worker_size` workers are spawned regardless of the match set's
/// size; objects are queued to them through a bounded channel.
pub struct BulkDeleter {
    config: Config,
    target: Storage,
}

impl BulkDeleter {
    pub fn new(config: Config, target: Storage) -> Self {
        Self { config, target }
    }

    /// Attempt deletion of every object in `matches`.
    ///
    /// Returns a report with exactly one entry per distinct object id.
    /// Individual failures never abort the batch.
    pub async fn delete_all(&self, matches: MatchSet) -> Result<DeletionReport> {
        if self.config.worker_size == 0 {
            return Err(anyhow!(GdrmError::InvalidConfig(
                "worker size must be at least 1".to_string()
            )));
        }

        let worker_size = self.config.worker_size as usize;
        let (object_sender, object_receiver) = async_channel::bounded::<DriveObject>(worker_size);
        let (record_sender, record_receiver) =
            async_channel::bounded::<DeletionRecord>(worker_size);

        let terminator_handle = tokio::spawn(Terminator::new(record_receiver).terminate());

        let worker_handles: Vec<JoinHandle<()>> = (0..self.config.worker_size)
            .map(|worker_index| {
                let stage = Stage::new(
                    self.config.clone(),
                    dyn_clone::clone_box(&*self.target),
                    Some(object_receiver.clone()),
                    Some(record_sender.clone()),
                );
                spawn_worker(ObjectDeleter::new(stage, worker_index), worker_index)
            })
            .collect();

        // Only workers hold the channel ends from here on. If every worker
        // dies the queue closes and feeding stops.
        drop(object_receiver);
        drop(record_sender);

        self.feed(&matches, &object_sender).await;
        drop(object_sender);

        for handle in worker_handles {
            let _ = handle.await;
        }

        let mut report = terminator_handle
            .await
            .map_err(|e| anyhow!(GdrmError::Pipeline(format!("terminator task panicked: {}", e))))?;

        self.record_missing_outcomes(&matches, &mut report).await;

        debug!(
            deleted = report.deleted_count(),
            failed = report.failed_count(),
            "bulk deletion has been completed."
        );
        Ok(report)
    }

    async fn feed(&self, matches: &MatchSet, object_sender: &async_channel::Sender<DriveObject>) {
        for object in matches {
            if object_sender.send(object.clone()).await.is_err() {
                error!("all delete workers have stopped. remaining objects are not attempted.");
                return;
            }
        }
    }

    async fn record_missing_outcomes(&self, matches: &MatchSet, report: &mut DeletionReport) {
        for object in matches {
            if report.contains(object.id()) {
                continue;
            }

            error!(
                file_id = object.id(),
                "no outcome reported for {} ({}).",
                object.name(),
                object.id()
            );
            self.target
                .send_stats(DeletionStatistics::DeleteError {
                    id: object.id().to_string(),
                })
                .await;
            report.record(DeletionRecord {
                id: object.id().to_string(),
                name: object.name().to_string(),
                outcome: DeletionOutcome::Failed(WORKER_TERMINATED_REASON.to_string()),
            });
        }
    }
}

/// Spawn a worker using the double-spawn pattern so that a panic is caught
/// and logged instead of tearing down the run.
fn spawn_worker(mut object_deleter: ObjectDeleter, worker_index: u16) -> JoinHandle<()> {
    tokio::spawn(async move {
        let join_result = tokio::spawn(async move { object_deleter.delete().await }).await;

        match join_result {
            Ok(Ok(())) => {
                debug!(worker_index, "delete worker completed successfully.");
            }
            Ok(Err(e)) => {
                error!(worker_index, "delete worker failed: {:#}", e);
            }
            Err(e) => {
                error!(worker_index, "delete worker task panicked: {}", e);
            }
        }
    })
}
