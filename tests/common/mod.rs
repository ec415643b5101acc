//! Shared integration test infrastructure for gdrm-rs.
//!
//! Provides `FakeDrive`, an in-memory `StorageTrait` implementation with a
//! configurable delete response per file id, and helpers to run a pipeline
//! over it.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_channel::Sender;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use gdrm_rs::config::args::build_config_from_args;
use gdrm_rs::storage::{Storage, StorageTrait};
use gdrm_rs::types::{DeletionStatistics, ObjectPage};
use gdrm_rs::{Config, DeletionPipeline, DriveObject, DriveQuery, GdrmError, RunOutcome};

/// How the fake answers a delete for a given id.
#[derive(Debug, Clone)]
pub enum DeleteResponse {
    Ok,
    NotFound,
    Status(u16, String),
    Slow(Duration),
}

#[derive(Default)]
struct FakeDriveState {
    pages: Vec<Vec<DriveObject>>,
    responses: HashMap<String, DeleteResponse>,
    list_queries: Mutex<Vec<String>>,
    deleted: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// In-memory Drive double. Clones share state.
#[derive(Clone)]
pub struct FakeDrive {
    state: Arc<FakeDriveState>,
    stats_sender: Sender<DeletionStatistics>,
}

#[derive(Default)]
pub struct FakeDriveBuilder {
    pages: Vec<Vec<DriveObject>>,
    responses: HashMap<String, DeleteResponse>,
}

impl FakeDriveBuilder {
    pub fn page(mut self, objects: Vec<DriveObject>) -> Self {
        self.pages.push(objects);
        self
    }

    pub fn respond(mut self, id: &str, response: DeleteResponse) -> Self {
        self.responses.insert(id.to_string(), response);
        self
    }

    pub fn build(self, stats_sender: Sender<DeletionStatistics>) -> FakeDrive {
        FakeDrive {
            state: Arc::new(FakeDriveState {
                pages: self.pages,
                responses: self.responses,
                ..FakeDriveState::default()
            }),
            stats_sender,
        }
    }
}

impl FakeDrive {
    pub fn builder() -> FakeDriveBuilder {
        FakeDriveBuilder::default()
    }

    pub fn list_queries(&self) -> Vec<String> {
        self.state.list_queries.lock().unwrap().clone()
    }

    pub fn delete_calls(&self) -> Vec<String> {
        self.state.deleted.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.state.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageTrait for FakeDrive {
    async fn list_objects_page(
        &self,
        query: &DriveQuery,
        page_token: Option<String>,
        _page_size: i32,
    ) -> Result<ObjectPage> {
        self.state
            .list_queries
            .lock()
            .unwrap()
            .push(query.as_str().to_string());

        let index = match page_token {
            None => 0,
            Some(token) => token
                .strip_prefix("page-")
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| anyhow!("unknown page token {token}"))?,
        };

        let files = self.state.pages.get(index).cloned().unwrap_or_default();
        let next_page_token = if index + 1 < self.state.pages.len() {
            Some(format!("page-{}", index + 1))
        } else {
            None
        };

        Ok(ObjectPage {
            files,
            next_page_token,
            incomplete_search: false,
        })
    }

    async fn delete_object(&self, id: &str) -> Result<()> {
        self.state.deleted.lock().unwrap().push(id.to_string());

        let current = self.state.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_in_flight.fetch_max(current, Ordering::SeqCst);

        let response = self
            .state
            .responses
            .get(id)
            .cloned()
            .unwrap_or(DeleteResponse::Ok);
        let result = match response {
            DeleteResponse::Ok => Ok(()),
            DeleteResponse::NotFound => Err(anyhow!(GdrmError::NotFoundOnDelete(id.to_string()))),
            DeleteResponse::Status(status, reason) => Err(anyhow!(GdrmError::Delete(format!(
                "HTTP {status}: {reason}"
            )))),
            DeleteResponse::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        };

        self.state.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn get_stats_sender(&self) -> Sender<DeletionStatistics> {
        self.stats_sender.clone()
    }

    async fn send_stats(&self, stats: DeletionStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }
}

/// Reference instant for every run in the integration tests.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

pub fn object(id: &str) -> DriveObject {
    DriveObject::new(id, &format!("{id}.txt"))
}

/// Build a config with logging off. `args` excludes the program name.
pub fn build_config(args: Vec<&str>) -> Config {
    let mut full_args = vec!["gdrm", "-qqq"];
    full_args.extend(args);
    build_config_from_args(full_args).unwrap()
}

/// Result of running a pipeline over a [`FakeDrive`].
pub struct PipelineResult {
    pub outcome: Result<RunOutcome>,
    pub stats: Vec<DeletionStatistics>,
}

pub async fn run_pipeline(config: Config, builder: FakeDriveBuilder) -> (PipelineResult, FakeDrive) {
    let (stats_sender, stats_receiver) = async_channel::unbounded();
    let drive = builder.build(stats_sender);
    let storage: Storage = Box::new(drive.clone());

    let pipeline = DeletionPipeline::with_storage(config, storage, stats_receiver.clone());
    let outcome = pipeline.run_at(now()).await;
    pipeline.close_stats_sender();

    let mut stats = Vec::new();
    while let Ok(item) = stats_receiver.try_recv() {
        stats.push(item);
    }

    (PipelineResult { outcome, stats }, drive)
}
