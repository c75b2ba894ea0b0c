use std::process::ExitCode;

use steer_ecu::{Controller, ControllerConfig};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> ExitCode {
    // 1. Setup Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("tracing subscriber already installed");
    }

    tracing::info!("ECU controller booting...");

    // 2. Configuration
    let config = match ControllerConfig::load() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // 3. Run until the sensor closes its end
    let mut controller = Controller::new(config);
    match controller.run().await {
        Ok(report) => {
            tracing::info!(
                cycles = report.control.cycles,
                skipped = report.control.skipped_lines,
                deadline_misses = report.control.deadline_misses,
                rows = report.logger.rows_written,
                "ECU controller stopped"
            );
            ExitCode::SUCCESS
        }
        Err(_) => ExitCode::FAILURE,
    }
}
