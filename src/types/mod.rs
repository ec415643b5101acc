use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::types::error::GdrmError;

pub mod error;

/// A Drive file as returned by `files.list`.
///
/// Only the identifier is used to address the file. The name and the
/// modification time are carried for logging.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveObject {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub modified_time: Option<DateTime<Utc>>,
}

impl DriveObject {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            modified_time: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Every object matched by one listing run, in server order.
pub type MatchSet = Vec<DriveObject>;

/// One page of a `files.list` response.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPage {
    #[serde(default)]
    pub files: Vec<DriveObject>,
    #[serde(default)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub incomplete_search: bool,
}

/// Modification-time window. Both bounds are exclusive in the query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, GdrmError> {
        if start >= end {
            return Err(GdrmError::InvalidCriteria(format!(
                "window start ({}) must precede window end ({})",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

/// Container plus time window: the full description of what gets deleted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionCriteria {
    container_id: String,
    window: TimeWindow,
}

impl SelectionCriteria {
    pub fn new(container_id: &str, window: TimeWindow) -> Result<Self, GdrmError> {
        if container_id.trim().is_empty() {
            return Err(GdrmError::InvalidCriteria(
                "container id must not be empty".to_string(),
            ));
        }
        Ok(Self {
            container_id: container_id.to_string(),
            window,
        })
    }

    pub fn container_id(&self) -> &str {
        &self.container_id
    }

    pub fn window(&self) -> &TimeWindow {
        &self.window
    }
}

/// Result of deleting a single object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionOutcome {
    Deleted,
    Failed(String),
}

impl DeletionOutcome {
    pub fn is_deleted(&self) -> bool {
        matches!(self, Self::Deleted)
    }
}

impl fmt::Display for DeletionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Deleted => write!(f, "deleted"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Message sent from a delete worker to the report collector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionRecord {
    pub id: String,
    pub name: String,
    pub outcome: DeletionOutcome,
}

/// Per-object outcomes of one run, keyed by object id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletionReport {
    entries: HashMap<String, DeletionRecord>,
}

impl DeletionReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the outcome for an object. Returns `false` if the id was
    /// already present; the first recorded outcome is kept.
    pub fn record(&mut self, record: DeletionRecord) -> bool {
        if self.entries.contains_key(&record.id) {
            return false;
        }
        self.entries.insert(record.id.clone(), record);
        true
    }

    pub fn outcome(&self, id: &str) -> Option<&DeletionOutcome> {
        self.entries.get(id).map(|record| &record.outcome)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn records(&self) -> impl Iterator<Item = &DeletionRecord> {
        self.entries.values()
    }

    pub fn failures(&self) -> impl Iterator<Item = &DeletionRecord> {
        self.entries
            .values()
            .filter(|record| !record.outcome.is_deleted())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn deleted_count(&self) -> u64 {
        self.entries
            .values()
            .filter(|record| record.outcome.is_deleted())
            .count() as u64
    }

    pub fn failed_count(&self) -> u64 {
        self.len() as u64 - self.deleted_count()
    }

    pub fn has_failure(&self) -> bool {
        self.failed_count() > 0
    }
}

/// Statistics sent through the stats channel during pipeline execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeletionStatistics {
    DeleteComplete { id: String },
    DeleteAlreadyAbsent { id: String },
    DeleteError { id: String },
}

/// Service-account credential source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriveCredentials {
    ServiceAccountFile(PathBuf),
}
