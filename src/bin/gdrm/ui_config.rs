// Decides whether to show the progress indicator and the result summary
// based on Config settings (quiet mode, verbosity, JSON logging).

use gdrm_rs::config::Config;

/// Whether to show the live-updating progress indicator.
///
/// Returns `false` when:
/// - `show_no_progress` is set
/// - Verbosity is above Warn (per-file progress lines take over the terminal)
/// - JSON logging is enabled (progress text would corrupt JSON output)
pub fn is_progress_indicator_needed(config: &Config) -> bool {
    if config.show_no_progress {
        return false;
    }

    match config.tracing_config.as_ref() {
        None => true,
        Some(tracing_config) if log::Level::Warn < tracing_config.tracing_level => false,
        Some(tracing_config) => !tracing_config.json_tracing,
    }
}

/// Whether to show the final result summary line.
pub fn is_show_result_needed(config: &Config) -> bool {
    if config.show_no_progress {
        return false;
    }

    config
        .tracing_config
        .as_ref()
        .is_none_or(|tracing_config| !tracing_config.json_tracing)
}
