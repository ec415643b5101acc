/*!
# Overview
gdrm-rs deletes Google Drive files in bulk.
It selects the files directly inside one folder (or shared drive) whose
modification time falls within a time window, and deletes them with a
bounded pool of concurrent workers.

## Features
- **Time-window selection**: relative day offsets (default: 28 to 14 days ago) or absolute RFC 3339 bounds
- **Shared drives**: listing and deletion include items from shared drives
- **Bounded concurrency**: a fixed number of delete workers regardless of the number of matches
- **Per-file outcomes**: one failure never stops the rest of the batch; the exit code reports it
- **Library-First**: the gdrm CLI is a thin wrapper over this library

## As a Library

```toml
[dependencies]
gdrm-rs = "0.1"
tokio = { version = "1", features = ["full"] }
```

```no_run
use gdrm_rs::config::Config;
use gdrm_rs::config::args::parse_from_args;
use gdrm_rs::{DeletionPipeline, exit_code_from_error};

#[tokio::main]
async fn main() {
    let args = vec![
        "gdrm",
        "--service-account-file",
        "service_account.json",
        "1AbCdEfGh",
    ];

    let parsed_args = parse_from_args(args).unwrap();
    let config = Config::try_from(parsed_args).unwrap();

    let pipeline = match DeletionPipeline::new(config).await {
        Ok(pipeline) => pipeline,
        Err(e) => std::process::exit(exit_code_from_error(&e)),
    };
    pipeline.close_stats_sender();

    match pipeline.run().await {
        Ok(outcome) => std::process::exit(outcome.exit_code()),
        Err(e) => {
            eprintln!("{:#}", e);
            std::process::exit(exit_code_from_error(&e));
        }
    }
}
```
*/

pub mod config;
pub mod deleter;
pub mod lister;
pub mod pipeline;
pub mod query;
pub mod stage;
pub mod storage;
pub mod terminator;
pub mod types;

#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use config::args::CLIArgs;
pub use pipeline::{DeletionPipeline, RunOutcome};
pub use query::{DriveQuery, QueryBuilder};
pub use types::error::{GdrmError, exit_code_from_error};
pub use types::{DeletionOutcome, DeletionReport, DriveObject, SelectionCriteria, TimeWindow};
