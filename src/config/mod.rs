pub mod args;

use std::path::PathBuf;

use chrono::{DateTime, Duration, SubsecRound, Utc};

use crate::types::error::GdrmError;
use crate::types::{DriveCredentials, SelectionCriteria, TimeWindow};

pub const DEFAULT_API_ENDPOINT: &str = "https://www.googleapis.com/drive/v3";
pub const DEFAULT_SERVICE_ACCOUNT_FILE: &str = "service_account.json";

/// Main configuration for the gdrm-rs deletion pipeline.
///
/// Holds the target container, the time window definition, the worker pool
/// size and the client settings needed to talk to Drive.
///
/// # Quick Start
///
/// ```
/// use gdrm_rs::Config;
///
/// let config = Config::for_container("1AbCdEfGh");
/// assert_eq!(config.worker_size, 8);
/// assert_eq!(config.window_start_days_ago, 28);
/// assert_eq!(config.window_end_days_ago, 14);
/// ```
///
/// The window can be pinned to absolute bounds instead of offsets:
///
/// ```
/// use gdrm_rs::Config;
/// use chrono::{TimeZone, Utc};
///
/// let mut config = Config::for_container("1AbCdEfGh");
/// config.modified_after = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
/// config.modified_before = Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub container_id: String,
    pub window_start_days_ago: u32,
    pub window_end_days_ago: u32,
    pub modified_after: Option<DateTime<Utc>>,
    pub modified_before: Option<DateTime<Utc>>,
    pub worker_size: u16,
    pub page_size: i32,
    pub operation_timeout_milliseconds: u64,
    pub client_config: Option<ClientConfig>,
    pub tracing_config: Option<TracingConfig>,
    pub show_no_progress: bool,
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

impl Config {
    /// Create a `Config` with defaults for the given container.
    ///
    /// No client configuration is set: the storage must either be supplied
    /// directly to the pipeline or `client_config` filled in.
    pub fn for_container(container_id: &str) -> Self {
        Config {
            container_id: container_id.to_string(),
            ..Config::default()
        }
    }

    /// Resolve the configured window against `now`.
    ///
    /// Absolute bounds take precedence over the day offsets. `now` is
    /// truncated to milliseconds, the precision Drive stores.
    pub fn resolve_window(&self, now: DateTime<Utc>) -> Result<TimeWindow, GdrmError> {
        let now = now.trunc_subsecs(3);
        let start = match self.modified_after {
            Some(start) => start,
            None => days_before(now, self.window_start_days_ago)?,
        };
        let end = match self.modified_before {
            Some(end) => end,
            None => days_before(now, self.window_end_days_ago)?,
        };

        TimeWindow::new(start, end)
    }

    pub fn selection_criteria(&self, now: DateTime<Utc>) -> Result<SelectionCriteria, GdrmError> {
        SelectionCriteria::new(&self.container_id, self.resolve_window(now)?)
    }
}

fn days_before(now: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>, GdrmError> {
    Duration::try_days(i64::from(days))
        .and_then(|offset| now.checked_sub_signed(offset))
        .ok_or_else(|| {
            GdrmError::InvalidCriteria(format!("{days} days before {now} is out of range"))
        })
}

impl Default for Config {
    fn default() -> Self {
        Config {
            container_id: String::new(),
            window_start_days_ago: 28,
            window_end_days_ago: 14,
            modified_after: None,
            modified_before: None,
            worker_size: 8,
            page_size: 1000,
            operation_timeout_milliseconds: 60_000,
            client_config: None,
            tracing_config: None,
            show_no_progress: false,
            auto_complete_shell: None,
        }
    }
}

/// Drive client configuration: where the credential lives and how to
/// reach the API.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credential: DriveCredentials,
    pub api_endpoint: String,
    pub timeout_config: CLITimeoutConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            credential: DriveCredentials::ServiceAccountFile(PathBuf::from(
                DEFAULT_SERVICE_ACCOUNT_FILE,
            )),
            api_endpoint: DEFAULT_API_ENDPOINT.to_string(),
            timeout_config: CLITimeoutConfig::default(),
        }
    }
}

/// HTTP timeout configuration.
#[derive(Debug, Clone)]
pub struct CLITimeoutConfig {
    pub request_timeout_milliseconds: Option<u64>,
    pub connect_timeout_milliseconds: Option<u64>,
}

impl Default for CLITimeoutConfig {
    fn default() -> Self {
        CLITimeoutConfig {
            request_timeout_milliseconds: Some(30_000),
            connect_timeout_milliseconds: None,
        }
    }
}

/// Tracing (logging) configuration.
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub http_client_tracing: bool,
    pub span_events_tracing: bool,
    pub disable_color_tracing: bool,
}
