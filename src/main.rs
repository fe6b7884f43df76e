use std::process::ExitCode;

use chrono::Local;
use clap::Parser;
use nejm_scrap::{cli, cli::Cli, info_time, telemetry};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_tracing();
    let start_time = Local::now();

    let code = match cli::run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "run failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    };
    info_time!(start_time, "Full program time:");

    code
}
