use clap::{CommandFactory, Parser};
use clap_complete::generate;
use tracing::{debug, error, trace};

use gdrm_rs::config::Config;
use gdrm_rs::{CLIArgs, DeletionPipeline, RunOutcome, exit_code_from_error};

pub mod indicator;
mod tracing_init;
pub mod ui_config;

const EXIT_CODE_USAGE: i32 = 1;

/// gdrm - Bulk deletion of Google Drive files by folder and modification time.
///
/// This binary is a thin wrapper over the gdrm-rs library.
/// All core functionality is implemented in the library crate.
#[tokio::main]
async fn main() {
    let config = load_config_exit_if_err();

    if let Some(shell) = config.auto_complete_shell {
        generate(
            shell,
            &mut CLIArgs::command(),
            "gdrm",
            &mut std::io::stdout(),
        );

        return;
    }

    start_tracing_if_necessary(&config);

    trace!("config = {:?}", config);

    let exit_code = run(config).await;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn load_config_exit_if_err() -> Config {
    let args = match CLIArgs::try_parse() {
        Ok(args) => args,
        Err(e) if e.use_stderr() => {
            println!("{}", e.render());
            std::process::exit(EXIT_CODE_USAGE);
        }
        // --help and --version
        Err(e) => e.exit(),
    };

    match Config::try_from(args) {
        Ok(config) => config,
        Err(error_message) => {
            clap::Error::raw(clap::error::ErrorKind::ValueValidation, error_message).exit()
        }
    }
}

fn start_tracing_if_necessary(config: &Config) -> bool {
    let Some(tracing_config) = config.tracing_config.as_ref() else {
        return false;
    };

    tracing_init::init_tracing(tracing_config);
    true
}

async fn run(config: Config) -> i32 {
    let start_time = tokio::time::Instant::now();
    debug!("deletion pipeline start.");

    let pipeline = match DeletionPipeline::new(config.clone()).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!("{:#}", e);
            return exit_code_from_error(&e);
        }
    };

    let indicator_join_handle = indicator::show_indicator(
        pipeline.get_stats_receiver(),
        ui_config::is_progress_indicator_needed(&config),
        ui_config::is_show_result_needed(&config),
    );

    let result = pipeline.run().await;
    pipeline.close_stats_sender();
    if let Err(e) = indicator_join_handle.await {
        error!("progress indicator failed: {}", e);
    }

    let duration_sec = format!("{:.3}", start_time.elapsed().as_secs_f32());

    match result {
        Ok(outcome) => {
            if let RunOutcome::Completed(report) = &outcome {
                for record in report.failures() {
                    error!(
                        file_id = record.id,
                        "{} ({}): {}", record.name, record.id, record.outcome
                    );
                }
            }

            debug!(duration_sec = duration_sec, "gdrm has been completed.");
            outcome.exit_code()
        }
        Err(e) => {
            error!("{:#}", e);
            error!(duration_sec = duration_sec, "gdrm failed.");
            exit_code_from_error(&e)
        }
    }
}
