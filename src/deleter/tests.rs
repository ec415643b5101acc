use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use proptest::prelude::*;

use super::*;
use crate::query::DriveQuery;
use crate::storage::StorageTrait;
use crate::test_utils::{init_dummy_tracing_subscriber, make_drive_object, make_test_config};
use crate::types::ObjectPage;

// ---------------------------------------------------------------------------
// Mock storage
// ---------------------------------------------------------------------------

/// How the mock answers a delete for a given id.
#[derive(Debug, Clone)]
enum DeleteBehavior {
    Succeed,
    NotFound,
    Fail(String),
    Hang,
    Panic,
}

/// A mock Storage that counts delete attempts and concurrent in-flight calls.
#[derive(Clone)]
struct MockStorage {
    stats_sender: Sender<DeletionStatistics>,
    behaviors: Arc<HashMap<String, DeleteBehavior>>,
    delay: std::time::Duration,
    attempts: Arc<Mutex<Vec<String>>>,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
}

impl MockStorage {
    fn new(stats_sender: Sender<DeletionStatistics>) -> Self {
        Self {
            stats_sender,
            behaviors: Arc::new(HashMap::new()),
            delay: std::time::Duration::ZERO,
            attempts: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn with_behaviors(mut self, behaviors: Vec<(&str, DeleteBehavior)>) -> Self {
        self.behaviors = Arc::new(
            behaviors
                .into_iter()
                .map(|(id, behavior)| (id.to_string(), behavior))
                .collect(),
        );
        self
    }

    fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = delay;
        self
    }

    fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap().clone()
    }
}

/// Decrements the in-flight counter even when the call is cancelled by a
/// timeout or unwinds.
struct InFlightGuard(Arc<AtomicUsize>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl StorageTrait for MockStorage {
    async fn list_objects_page(
        &self,
        _query: &DriveQuery,
        _page_token: Option<String>,
        _page_size: i32,
    ) -> Result<ObjectPage> {
        panic!("deletion must never list");
    }

    async fn delete_object(&self, id: &str) -> Result<()> {
        self.attempts.lock().unwrap().push(id.to_string());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let _guard = InFlightGuard(self.in_flight.clone());
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self
            .behaviors
            .get(id)
            .cloned()
            .unwrap_or(DeleteBehavior::Succeed)
        {
            DeleteBehavior::Succeed => Ok(()),
            DeleteBehavior::NotFound => Err(GdrmError::NotFoundOnDelete(id.to_string()).into()),
            DeleteBehavior::Fail(reason) => Err(GdrmError::Delete(reason).into()),
            DeleteBehavior::Hang => {
                tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
                Ok(())
            }
            DeleteBehavior::Panic => panic!("mock storage panicked on {id}"),
        }
    }

    fn get_stats_sender(&self) -> Sender<DeletionStatistics> {
        self.stats_sender.clone()
    }

    async fn send_stats(&self, stats: DeletionStatistics) {
        let _ = self.stats_sender.send(stats).await;
    }
}

fn make_matches(ids: &[&str]) -> MatchSet {
    ids.iter()
        .map(|id| make_drive_object(id, &format!("{id}.txt")))
        .collect()
}

fn make_bulk_deleter(storage: &MockStorage, worker_size: u16) -> BulkDeleter {
    let mut config = make_test_config();
    config.worker_size = worker_size;
    BulkDeleter::new(config, Box::new(storage.clone()))
}

async fn collect_stats(receiver: Receiver<DeletionStatistics>) -> Vec<DeletionStatistics> {
    let mut stats = Vec::new();
    while let Ok(item) = receiver.try_recv() {
        stats.push(item);
    }
    stats
}

// ---------------------------------------------------------------------------
// ObjectDeleter
// ---------------------------------------------------------------------------

#[tokio::test]
async fn object_deleter_reports_one_record_per_object() {
    init_dummy_tracing_subscriber();

    let (stats_sender, _stats_receiver) = async_channel::unbounded();
    let storage = MockStorage::new(stats_sender)
        .with_behaviors(vec![("b", DeleteBehavior::Fail("HTTP 403".to_string()))]);

    let (object_sender, object_receiver) = async_channel::bounded(10);
    let (record_sender, record_receiver) = async_channel::bounded(10);
    let stage = Stage::new(
        make_test_config(),
        Box::new(storage.clone()),
        Some(object_receiver),
        Some(record_sender),
    );

    for object in make_matches(&["a", "b"]) {
        object_sender.send(object).await.unwrap();
    }
    drop(object_sender);

    let mut deleter = ObjectDeleter::new(stage, 0);
    deleter.delete().await.unwrap();
    drop(deleter);

    let first = record_receiver.recv().await.unwrap();
    let second = record_receiver.recv().await.unwrap();
    assert!(record_receiver.recv().await.is_err());

    assert_eq!(first.id, "a");
    assert_eq!(first.name, "a.txt");
    assert_eq!(first.outcome, DeletionOutcome::Deleted);
    assert_eq!(second.id, "b");
    assert_eq!(
        second.outcome,
        DeletionOutcome::Failed("HTTP 403".to_string())
    );
}

#[tokio::test]
async fn object_deleter_stops_when_collector_is_gone() {
    init_dummy_tracing_subscriber();

    let (stats_sender, _stats_receiver) = async_channel::unbounded();
    let storage = MockStorage::new(stats_sender);

    let (object_sender, object_receiver) = async_channel::bounded(10);
    let (record_sender, record_receiver) = async_channel::bounded(10);
    drop(record_receiver);

    for object in make_matches(&["a", "b", "c"]) {
        object_sender.send(object).await.unwrap();
    }
    drop(object_sender);

    let stage = Stage::new(
        make_test_config(),
        Box::new(storage.clone()),
        Some(object_receiver),
        Some(record_sender),
    );
    ObjectDeleter::new(stage, 0).delete().await.unwrap();

    assert_eq!(storage.attempts(), vec!["a"]);
}

// ---------------------------------------------------------------------------
// BulkDeleter
// ---------------------------------------------------------------------------

#[tokio::test]
async fn delete_all_attempts_every_object() {
    init_dummy_tracing_subscriber();

    let (stats_sender, _stats_receiver) = async_channel::unbounded();
    let storage = MockStorage::new(stats_sender);
    let ids: Vec<String> = (0..25).map(|i| format!("file-{i}")).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

    let report = make_bulk_deleter(&storage, 4)
        .delete_all(make_matches(&id_refs))
        .await
        .unwrap();

    let mut attempts = storage.attempts();
    attempts.sort();
    let mut expected = ids.clone();
    expected.sort();
    assert_eq!(attempts, expected);

    assert_eq!(report.len(), 25);
    assert_eq!(report.deleted_count(), 25);
    for id in &ids {
        assert_eq!(report.outcome(id), Some(&DeletionOutcome::Deleted));
    }
}

#[tokio::test]
async fn delete_all_empty_match_set() {
    init_dummy_tracing_subscriber();

    let (stats_sender, _stats_receiver) = async_channel::unbounded();
    let storage = MockStorage::new(stats_sender);

    let report = make_bulk_deleter(&storage, 4)
        .delete_all(MatchSet::new())
        .await
        .unwrap();

    assert!(report.is_empty());
    assert!(storage.attempts().is_empty());
}

#[tokio::test]
async fn delete_all_not_found_is_deleted() {
    init_dummy_tracing_subscriber();

    let (stats_sender, stats_receiver) = async_channel::unbounded();
    let storage =
        MockStorage::new(stats_sender).with_behaviors(vec![("gone", DeleteBehavior::NotFound)]);

    let report = make_bulk_deleter(&storage, 2)
        .delete_all(make_matches(&["gone"]))
        .await
        .unwrap();

    assert_eq!(report.outcome("gone"), Some(&DeletionOutcome::Deleted));
    assert!(!report.has_failure());
    assert_eq!(
        collect_stats(stats_receiver).await,
        vec![DeletionStatistics::DeleteAlreadyAbsent {
            id: "gone".to_string()
        }]
    );
}

#[tokio::test]
async fn delete_all_failure_does_not_stop_siblings() {
    init_dummy_tracing_subscriber();

    let (stats_sender, stats_receiver) = async_channel::unbounded();
    let storage = MockStorage::new(stats_sender).with_behaviors(vec![
        (
            "c",
            DeleteBehavior::Fail("HTTP 403: insufficientFilePermissions".to_string()),
        ),
        ("e", DeleteBehavior::Fail("connection reset".to_string())),
    ]);

    let report = make_bulk_deleter(&storage, 1)
        .delete_all(make_matches(&["a", "b", "c", "d", "e", "f"]))
        .await
        .unwrap();

    assert_eq!(storage.attempts(), vec!["a", "b", "c", "d", "e", "f"]);
    assert_eq!(report.len(), 6);
    assert_eq!(report.deleted_count(), 4);
    assert_eq!(report.failed_count(), 2);
    match report.outcome("c") {
        Some(DeletionOutcome::Failed(reason)) => {
            assert!(reason.contains("insufficientFilePermissions"))
        }
        other => panic!("unexpected outcome: {:?}", other),
    }

    let stats = collect_stats(stats_receiver).await;
    let errors = stats
        .iter()
        .filter(|s| matches!(s, DeletionStatistics::DeleteError { .. }))
        .count();
    let completes = stats
        .iter()
        .filter(|s| matches!(s, DeletionStatistics::DeleteComplete { .. }))
        .count();
    assert_eq!(errors, 2);
    assert_eq!(completes, 4);
}

#[tokio::test]
async fn delete_all_times_out_hung_requests() {
    init_dummy_tracing_subscriber();

    let (stats_sender, _stats_receiver) = async_channel::unbounded();
    let storage =
        MockStorage::new(stats_sender).with_behaviors(vec![("stuck", DeleteBehavior::Hang)]);

    let mut config = make_test_config();
    config.worker_size = 2;
    config.operation_timeout_milliseconds = 50;
    let deleter = BulkDeleter::new(config, Box::new(storage.clone()));

    let report = deleter
        .delete_all(make_matches(&["a", "stuck", "b"]))
        .await
        .unwrap();

    assert_eq!(report.len(), 3);
    assert_eq!(report.deleted_count(), 2);
    match report.outcome("stuck") {
        Some(DeletionOutcome::Failed(reason)) => assert!(reason.contains("timed out")),
        other => panic!("unexpected outcome: {:?}", other),
    }
    assert_eq!(storage.in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn delete_all_records_objects_lost_to_a_panicked_worker() {
    init_dummy_tracing_subscriber();

    let (stats_sender, _stats_receiver) = async_channel::unbounded();
    let storage =
        MockStorage::new(stats_sender).with_behaviors(vec![("boom", DeleteBehavior::Panic)]);

    let report = make_bulk_deleter(&storage, 2)
        .delete_all(make_matches(&["a", "boom", "b", "c", "d"]))
        .await
        .unwrap();

    assert_eq!(report.len(), 5);
    assert_eq!(
        report.outcome("boom"),
        Some(&DeletionOutcome::Failed(
            WORKER_TERMINATED_REASON.to_string()
        ))
    );
    assert_eq!(report.deleted_count(), 4);
}

#[tokio::test]
async fn delete_all_when_every_worker_dies() {
    init_dummy_tracing_subscriber();

    let (stats_sender, _stats_receiver) = async_channel::unbounded();
    let storage =
        MockStorage::new(stats_sender).with_behaviors(vec![("boom", DeleteBehavior::Panic)]);

    let report = make_bulk_deleter(&storage, 1)
        .delete_all(make_matches(&["boom", "a", "b", "c"]))
        .await
        .unwrap();

    // Every listed object still has exactly one outcome.
    assert_eq!(report.len(), 4);
    assert_eq!(report.failed_count(), 4);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn delete_all_respects_worker_bound() {
    init_dummy_tracing_subscriber();

    let (stats_sender, _stats_receiver) = async_channel::unbounded();
    let storage =
        MockStorage::new(stats_sender).with_delay(std::time::Duration::from_millis(10));
    let ids: Vec<String> = (0..40).map(|i| format!("file-{i}")).collect();
    let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

    let report = make_bulk_deleter(&storage, 3)
        .delete_all(make_matches(&id_refs))
        .await
        .unwrap();

    assert_eq!(report.len(), 40);
    let max_in_flight = storage.max_in_flight.load(Ordering::SeqCst);
    assert!(max_in_flight <= 3, "max in flight was {max_in_flight}");
    assert!(max_in_flight > 1, "deletes never overlapped");
}

#[tokio::test]
async fn delete_all_rejects_zero_workers() {
    let (stats_sender, _stats_receiver) = async_channel::unbounded();
    let storage = MockStorage::new(stats_sender);

    let e = make_bulk_deleter(&storage, 0)
        .delete_all(make_matches(&["a"]))
        .await
        .unwrap_err();

    assert!(matches!(
        e.downcast_ref::<GdrmError>(),
        Some(GdrmError::InvalidConfig(_))
    ));
    assert!(storage.attempts().is_empty());
}

#[test]
fn failure_reason_prefers_typed_message() {
    let e: anyhow::Error = GdrmError::Delete("HTTP 500: backendError".to_string()).into();
    assert_eq!(failure_reason(&e), "HTTP 500: backendError");

    let e = anyhow::anyhow!("socket closed").context("files.delete failed.");
    assert_eq!(failure_reason(&e), "files.delete failed.: socket closed");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn report_has_one_entry_per_object(
        outcomes in proptest::collection::vec(0u8..3, 0..40),
        worker_size in 1u16..6,
    ) {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        runtime.block_on(async {
            let (stats_sender, _stats_receiver) = async_channel::unbounded();
            let ids: Vec<String> = (0..outcomes.len()).map(|i| format!("id-{i}")).collect();
            let behaviors = ids
                .iter()
                .zip(&outcomes)
                .map(|(id, outcome)| {
                    let behavior = match outcome {
                        0 => DeleteBehavior::Succeed,
                        1 => DeleteBehavior::NotFound,
                        _ => DeleteBehavior::Fail("HTTP 403".to_string()),
                    };
                    (id.as_str(), behavior)
                })
                .collect();
            let storage = MockStorage::new(stats_sender).with_behaviors(behaviors);
            let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

            let report = make_bulk_deleter(&storage, worker_size)
                .delete_all(make_matches(&id_refs))
                .await
                .unwrap();

            let expected_failed = outcomes.iter().filter(|o| **o == 2).count() as u64;
            prop_assert_eq!(storage.attempts().len(), ids.len());
            prop_assert_eq!(report.len(), ids.len());
            prop_assert_eq!(report.failed_count(), expected_failed);
            for id in &ids {
                prop_assert!(report.contains(id));
            }
            Ok(())
        })?;
    }
}
