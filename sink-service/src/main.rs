//! Sink service binary.
//!
//! Loads the configuration, initializes tracing and runs both broker consumers together with
//! the health endpoint until the process receives SIGINT or SIGTERM.

use std::process::ExitCode;

use sink_config::shared::SinkConfig;
use sink_telemetry::tracing::init_tracing;
use tracing::error;

use crate::config::load_sink_config;
use crate::core::start_sink_with_config;
use crate::error::{ServiceError, ServiceResult};

mod config;
mod core;
mod error;
mod health;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprint!("{}", err.render_report());
            ExitCode::FAILURE
        }
    }
}

fn run() -> ServiceResult<()> {
    let sink_config = load_sink_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME")).map_err(ServiceError::config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(sink_config))
}

async fn async_main(sink_config: SinkConfig) -> ServiceResult<()> {
    if let Err(err) = start_sink_with_config(sink_config).await {
        error!(error = %err, "sink stopped with an error");
        return Err(err);
    }

    Ok(())
}
