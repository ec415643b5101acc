// Progress indicator for the gdrm binary.
//
// Reads DeletionStatistics from an async channel and updates a one-line
// progress display with a moving-average deletion rate.

use std::io;
use std::io::Write;

use async_channel::Receiver;
use gdrm_rs::types::DeletionStatistics;
use indicatif::{HumanCount, HumanDuration, ProgressBar, ProgressStyle};
use simple_moving_average::{SMA, SumTreeSMA};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::info;

/// Summary returned by [`show_indicator`] after the stats channel closes.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IndicatorSummary {
    /// Files deleted, including those that were already gone.
    pub total_delete_count: u64,
    pub total_already_absent_count: u64,
    pub total_error_count: u64,
}

impl IndicatorSummary {
    fn add(&mut self, stats: &DeletionStatistics) -> u64 {
        match stats {
            DeletionStatistics::DeleteComplete { .. } => {
                self.total_delete_count += 1;
                1
            }
            DeletionStatistics::DeleteAlreadyAbsent { .. } => {
                self.total_delete_count += 1;
                self.total_already_absent_count += 1;
                1
            }
            DeletionStatistics::DeleteError { .. } => {
                self.total_error_count += 1;
                0
            }
        }
    }
}

/// Moving average window in seconds (samples).
const MOVING_AVERAGE_PERIOD_SECS: usize = 10;

/// How often (in seconds) to refresh the progress display.
const REFRESH_INTERVAL: f32 = 1.0;

/// Spawn a background task that reads deletion statistics from the channel
/// and displays progress.
///
/// The task runs until `stats_receiver` is closed. Returns a `JoinHandle`
/// that should be awaited after the pipeline finishes.
pub fn show_indicator(
    stats_receiver: Receiver<DeletionStatistics>,
    show_progress: bool,
    show_result: bool,
) -> JoinHandle<IndicatorSummary> {
    let progress_text = ProgressBar::new(0);
    if let Ok(progress_style) = ProgressStyle::with_template("{wide_msg}") {
        progress_text.set_style(progress_style);
    }

    tokio::spawn(async move {
        let start_time = Instant::now();

        let mut ma_deleted_count = SumTreeSMA::<_, u64, MOVING_AVERAGE_PERIOD_SECS>::new();
        let mut summary = IndicatorSummary::default();

        loop {
            let mut period_count: u64 = 0;

            let period = Instant::now();
            loop {
                while let Ok(stats) = stats_receiver.try_recv() {
                    period_count += summary.add(&stats);
                }

                if REFRESH_INTERVAL < period.elapsed().as_secs_f32() {
                    break;
                }

                if stats_receiver.is_closed() && stats_receiver.is_empty() {
                    let elapsed = start_time.elapsed();
                    let elapsed_secs_f64 = elapsed.as_secs_f64();

                    let files_per_sec = if elapsed_secs_f64 < REFRESH_INTERVAL as f64 {
                        summary.total_delete_count
                    } else {
                        (summary.total_delete_count as f64 / elapsed_secs_f64) as u64
                    };

                    info!(
                        message = "deletion summary",
                        deleted_files = summary.total_delete_count,
                        already_absent = summary.total_already_absent_count,
                        deleted_files_per_sec = files_per_sec,
                        error = summary.total_error_count,
                        duration_sec = elapsed_secs_f64,
                    );

                    if show_result {
                        if let Ok(result_style) = ProgressStyle::with_template("{msg}") {
                            progress_text.set_style(result_style);
                        }

                        progress_text.finish_with_message(format!(
                            "deleted {:>3} files | {:>3} files/sec,  already absent {} files,  error {} files,  duration {}",
                            summary.total_delete_count,
                            HumanCount(files_per_sec),
                            summary.total_already_absent_count,
                            summary.total_error_count,
                            HumanDuration(elapsed),
                        ));

                        println!();
                        let _ = io::stdout().flush();
                    }

                    return summary;
                }

                tokio::time::sleep(std::time::Duration::from_secs_f32(0.05)).await;
            }

            ma_deleted_count.add_sample(period_count);

            if show_progress {
                progress_text.set_message(format!(
                    "deleted {:>3} files | {:>3} files/sec,  already absent {} files,  error {} files",
                    summary.total_delete_count,
                    HumanCount(ma_deleted_count.get_average()),
                    summary.total_already_absent_count,
                    summary.total_error_count,
                ));
            }
        }
    })
}
