//! Shared test utilities for the gdrm library crate.

use chrono::{DateTime, TimeZone, Utc};

use crate::config::Config;
use crate::types::DriveObject;

/// Initialise a dummy tracing subscriber for tests.
///
/// Uses `try_init` so that only the first call in a process actually
/// installs the subscriber; subsequent calls are silently ignored.
pub(crate) fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .try_init();
}

/// Create a default [`Config`] suitable for most unit tests.
///
/// Key defaults: `worker_size=4`, `page_size=1000`, container=`"folder123"`,
/// operation timeout of 5 seconds.
pub(crate) fn make_test_config() -> Config {
    Config {
        container_id: "folder123".to_string(),
        worker_size: 4,
        page_size: 1000,
        operation_timeout_milliseconds: 5_000,
        ..Config::default()
    }
}

/// Create a [`DriveObject`] with a fixed modification time.
pub(crate) fn make_drive_object(id: &str, name: &str) -> DriveObject {
    DriveObject {
        id: id.to_string(),
        name: name.to_string(),
        modified_time: Some(fixed_now() - chrono::Duration::days(20)),
    }
}

/// Reference instant used by window calculations in tests.
pub(crate) fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}
