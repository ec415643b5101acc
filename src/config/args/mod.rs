use crate::config::{CLITimeoutConfig, ClientConfig, Config, TracingConfig};
use crate::types::DriveCredentials;
use chrono::{DateTime, Utc};
use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::ffi::OsString;
use std::path::PathBuf;

pub mod value_parser;


// ---------------------------------------------------------------------------
// Default constants
// ---------------------------------------------------------------------------

const DEFAULT_WINDOW_START_DAYS_AGO: u32 = 28;
const DEFAULT_WINDOW_END_DAYS_AGO: u32 = 14;
const DEFAULT_WORKER_SIZE: u16 = 8;
const DEFAULT_PAGE_SIZE: i32 = 1000;
const DEFAULT_OPERATION_TIMEOUT_MILLISECONDS: u64 = 60_000;
const DEFAULT_REQUEST_TIMEOUT_MILLISECONDS: u64 = 30_000;
const DEFAULT_SERVICE_ACCOUNT_FILE: &str = crate::config::DEFAULT_SERVICE_ACCOUNT_FILE;
const DEFAULT_API_ENDPOINT: &str = crate::config::DEFAULT_API_ENDPOINT;
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_HTTP_CLIENT_TRACING: bool = false;
const DEFAULT_SPAN_EVENTS_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;
const DEFAULT_SHOW_NO_PROGRESS: bool = false;

const MAX_PAGE_SIZE: i32 = 1000;

// ---------------------------------------------------------------------------
// Error messages
// ---------------------------------------------------------------------------

const ERROR_MESSAGE_EMPTY_CONTAINER_ID: &str = "Container id must not be empty.";
const ERROR_MESSAGE_WORKER_SIZE_ZERO: &str = "Worker size must be at least 1.";
const ERROR_MESSAGE_PAGE_SIZE_OUT_OF_RANGE: &str = "Page size must be between 1 and 1000.";
const ERROR_MESSAGE_OPERATION_TIMEOUT_ZERO: &str = "Operation timeout must be at least 1ms.";
const ERROR_MESSAGE_INVALID_WINDOW: &str = "The time window start must precede its end.";

// ---------------------------------------------------------------------------
// CLIArgs (clap-derived argument struct)
// ---------------------------------------------------------------------------

/// gdrm - Bulk deletion of Google Drive files by folder and modification time.
///
/// Deletes every file directly inside the given folder (including folders in
/// shared drives) whose modification time lies inside the time window.
///
/// Example:
///   gdrm 1AbCdEfGhIjKlMn
///   gdrm 1AbCdEfGhIjKlMn --window-start-days-ago 28 --window-end-days-ago 21
///   gdrm 1AbCdEfGhIjKlMn --modified-after 2024-01-01T00:00:00Z --modified-before 2024-02-01T00:00:00Z
#[derive(Parser, Clone, Debug)]
#[command(name = "gdrm", version, about, long_about = None)]
pub struct CLIArgs {
    /// Drive folder (or shared drive) id whose files are deleted.
    #[arg(
        env,
        help = "Drive folder id",
        default_value_if("auto_complete_shell", clap::builder::ArgPredicate::IsPresent, "ignored"),
        required = false,
    )]
    pub container_id: String,

    // -----------------------------------------------------------------------
    // Window options
    // -----------------------------------------------------------------------
    /// Window start, in days before now. Default: 28.
    #[arg(long, env, default_value_t = DEFAULT_WINDOW_START_DAYS_AGO, help_heading = "Window")]
    pub window_start_days_ago: u32,

    /// Window end, in days before now. Default: 14.
    #[arg(long, env, default_value_t = DEFAULT_WINDOW_END_DAYS_AGO, help_heading = "Window")]
    pub window_end_days_ago: u32,

    /// Absolute window start (RFC 3339). Overrides --window-start-days-ago.
    #[arg(
        long,
        env,
        help_heading = "Window",
        long_help = r#"Delete only files modified after given time (RFC3339 datetime).
Overrides --window-start-days-ago.
Example: 2024-02-19T12:00:00Z"#
    )]
    pub modified_after: Option<DateTime<Utc>>,

    /// Absolute window end (RFC 3339). Overrides --window-end-days-ago.
    #[arg(
        long,
        env,
        help_heading = "Window",
        long_help = r#"Delete only files modified before given time (RFC3339 datetime).
Overrides --window-end-days-ago.
Example: 2024-03-04T12:00:00Z"#
    )]
    pub modified_before: Option<DateTime<Utc>>,

    // -----------------------------------------------------------------------
    // General options
    // -----------------------------------------------------------------------
    /// Don't show the progress bar.
    #[arg(long, env, default_value_t = DEFAULT_SHOW_NO_PROGRESS, help_heading = "General")]
    pub show_no_progress: bool,

    // -----------------------------------------------------------------------
    // Performance options
    // -----------------------------------------------------------------------
    /// Number of concurrent deletion workers. Default: 8.
    #[arg(long, env, default_value_t = DEFAULT_WORKER_SIZE, help_heading = "Performance")]
    pub worker_size: u16,

    /// Files per listing request (1-1000). Default: 1000.
    #[arg(long, env, default_value_t = DEFAULT_PAGE_SIZE, help_heading = "Performance")]
    pub page_size: i32,

    // -----------------------------------------------------------------------
    // Timeout options
    // -----------------------------------------------------------------------
    /// Upper bound for a single delete operation, in milliseconds. Default: 60000.
    #[arg(long, env, default_value_t = DEFAULT_OPERATION_TIMEOUT_MILLISECONDS, help_heading = "Timeout")]
    pub operation_timeout_milliseconds: u64,

    /// HTTP request timeout in milliseconds. Default: 30000.
    #[arg(long, env, default_value_t = DEFAULT_REQUEST_TIMEOUT_MILLISECONDS, help_heading = "Timeout")]
    pub request_timeout_milliseconds: u64,

    /// HTTP connection timeout in milliseconds.
    #[arg(long, env, help_heading = "Timeout")]
    pub connect_timeout_milliseconds: Option<u64>,

    // -----------------------------------------------------------------------
    // Google configuration
    // -----------------------------------------------------------------------
    /// Service-account JSON key file.
    #[arg(long, env, default_value = DEFAULT_SERVICE_ACCOUNT_FILE, value_parser = NonEmptyStringValueParser::new(), help_heading = "Google")]
    pub service_account_file: String,

    /// Drive API base URL.
    #[arg(long, env, default_value = DEFAULT_API_ENDPOINT, value_parser = value_parser::url::check_scheme, help_heading = "Google")]
    pub api_endpoint: String,

    // -----------------------------------------------------------------------
    // Logging options
    // -----------------------------------------------------------------------
    /// Verbosity level. -q (quiet), default (info), -v, -vv.
    #[command(flatten)]
    pub verbosity: Verbosity<InfoLevel>,

    /// Output logs in JSON format.
    #[arg(long, env, default_value_t = DEFAULT_JSON_TRACING, help_heading = "Logging")]
    pub json_tracing: bool,

    /// Enable HTTP client and authentication library tracing.
    #[arg(long, env, default_value_t = DEFAULT_HTTP_CLIENT_TRACING, help_heading = "Logging")]
    pub http_client_tracing: bool,

    /// Enable tracing span events.
    #[arg(long, env, default_value_t = DEFAULT_SPAN_EVENTS_TRACING, help_heading = "Logging")]
    pub span_events_tracing: bool,

    /// Disable colored output in logs.
    #[arg(long, env, default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Logging")]
    pub disable_color_tracing: bool,

    // -----------------------------------------------------------------------
    // Advanced options
    // -----------------------------------------------------------------------
    /// Generate shell completions.
    #[arg(long, env, help_heading = "Advanced")]
    pub auto_complete_shell: Option<clap_complete::shells::Shell>,
}

// ---------------------------------------------------------------------------
// parse_from_args (public API)
// ---------------------------------------------------------------------------

/// Parse command-line arguments into a `CLIArgs` struct.
///
/// # Example
///
/// ```
/// use gdrm_rs::config::args::parse_from_args;
///
/// let args = vec!["gdrm", "folder123", "--worker-size", "4"];
/// let cli_args = parse_from_args(args).unwrap();
/// assert_eq!(cli_args.container_id, "folder123");
/// assert_eq!(cli_args.worker_size, 4);
/// ```
pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

/// Parse arguments and build a Config in one step.
pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    Config::try_from(cli_args)
}

// ---------------------------------------------------------------------------
// Validation and Config conversion
// ---------------------------------------------------------------------------

impl CLIArgs {
    fn validate(&self) -> Result<(), String> {
        if self.container_id.trim().is_empty() {
            return Err(ERROR_MESSAGE_EMPTY_CONTAINER_ID.to_string());
        }
        if self.worker_size == 0 {
            return Err(ERROR_MESSAGE_WORKER_SIZE_ZERO.to_string());
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(ERROR_MESSAGE_PAGE_SIZE_OUT_OF_RANGE.to_string());
        }
        if self.operation_timeout_milliseconds == 0 {
            return Err(ERROR_MESSAGE_OPERATION_TIMEOUT_ZERO.to_string());
        }
        self.validate_window()
    }

    /// Reject windows that can never be valid regardless of "now".
    fn validate_window(&self) -> Result<(), String> {
        match (self.modified_after, self.modified_before) {
            (Some(after), Some(before)) if after >= before => {
                Err(ERROR_MESSAGE_INVALID_WINDOW.to_string())
            }
            (None, None) if self.window_start_days_ago <= self.window_end_days_ago => {
                Err(ERROR_MESSAGE_INVALID_WINDOW.to_string())
            }
            _ => Ok(()),
        }
    }

    fn build_client_config(&self) -> Option<ClientConfig> {
        Some(ClientConfig {
            credential: DriveCredentials::ServiceAccountFile(PathBuf::from(
                &self.service_account_file,
            )),
            api_endpoint: self.api_endpoint.clone(),
            timeout_config: CLITimeoutConfig {
                request_timeout_milliseconds: Some(self.request_timeout_milliseconds),
                connect_timeout_milliseconds: self.connect_timeout_milliseconds,
            },
        })
    }

    fn build_tracing_config(&self) -> Option<TracingConfig> {
        let log_level = self.verbosity.log_level()?;

        Some(TracingConfig {
            tracing_level: log_level,
            json_tracing: self.json_tracing,
            http_client_tracing: self.http_client_tracing,
            span_events_tracing: self.span_events_tracing,
            disable_color_tracing: self.disable_color_tracing,
        })
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(args: CLIArgs) -> Result<Self, Self::Error> {
        args.validate()?;

        let client_config = args.build_client_config();
        let tracing_config = args.build_tracing_config();

        Ok(Config {
            container_id: args.container_id,
            window_start_days_ago: args.window_start_days_ago,
            window_end_days_ago: args.window_end_days_ago,
            modified_after: args.modified_after,
            modified_before: args.modified_before,
            worker_size: args.worker_size,
            page_size: args.page_size,
            operation_timeout_milliseconds: args.operation_timeout_milliseconds,
            client_config,
            tracing_config,
            show_no_progress: args.show_no_progress,
            auto_complete_shell: args.auto_complete_shell,
        })
    }
}
