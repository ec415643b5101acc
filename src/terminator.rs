//! Terminator stage for the deletion pipeline.
//!
//! The Terminator is the single owner of the deletion report. Workers send
//! one record per object; the Terminator drains the channel until every
//! sender is gone and returns the collected report.

use async_channel::Receiver;
use tracing::{debug, warn};

use crate::types::{DeletionRecord, DeletionReport};

/// Terminal stage that collects per-object outcomes.
#[derive(Debug)]
pub struct Terminator {
    receiver: Receiver<DeletionRecord>,
}

impl Terminator {
    pub fn new(receiver: Receiver<DeletionRecord>) -> Self {
        Self { receiver }
    }

    /// Consume all records until the channel closes.
    pub async fn terminate(self) -> DeletionReport {
        debug!("terminator has started.");

        let mut report = DeletionReport::new();
        while let Ok(record) = self.receiver.recv().await {
            let id = record.id.clone();
            if !report.record(record) {
                warn!(file_id = id, "duplicate outcome ignored.");
            }
        }

        debug!(records = report.len(), "terminator has been completed.");
        report
    }
}
