use anyhow::{Context, Result, anyhow};
use async_channel::{Receiver, Sender};

use crate::config::Config;
use crate::storage::Storage;
use crate::types::{DeletionRecord, DeletionStatistics, DriveObject};

/// Result of sending a record to the next stage.
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    Success,
    Closed,
}

/// Shared context handed to each deletion worker.
///
/// Workers read objects from `receiver` (shared MPMC queue) and write one
/// [`DeletionRecord`] per object to `sender`, which feeds the collector.
pub struct Stage {
    pub config: Config,
    pub target: Storage,
    pub receiver: Option<Receiver<DriveObject>>,
    pub sender: Option<Sender<DeletionRecord>>,
}

impl Stage {
    pub fn new(
        config: Config,
        target: Storage,
        receiver: Option<Receiver<DriveObject>>,
        sender: Option<Sender<DeletionRecord>>,
    ) -> Self {
        Self {
            config,
            target,
            receiver,
            sender,
        }
    }

    /// Send a record to the collector.
    ///
    /// Returns `SendResult::Closed` if the collector has gone away.
    pub async fn send(&self, record: DeletionRecord) -> Result<SendResult> {
        let Some(sender) = self.sender.as_ref() else {
            return Err(anyhow!("stage has no output channel."));
        };

        let result = sender
            .send(record)
            .await
            .context("async_channel::Sender::send() failed.");

        if let Err(e) = result {
            return if !self.is_channel_closed() {
                Err(e)
            } else {
                Ok(SendResult::Closed)
            };
        }

        Ok(SendResult::Success)
    }

    /// Check if the output channel has been closed by the receiver.
    pub fn is_channel_closed(&self) -> bool {
        self.sender.as_ref().is_none_or(|sender| sender.is_closed())
    }

    /// Send a statistics event through the storage stats channel.
    pub async fn send_stats(&self, stats: DeletionStatistics) {
        self.target.send_stats(stats).await;
    }
}
