use anyhow::Context;
use std::time::Duration;
use tokio::fs::{File, OpenOptions};
use tokio::io::BufReader;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use steer_ecu::sensor::{run_sensor, SensorConfig, VehicleSim};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Setup Logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")?;

    let config = SensorConfig::from_env()?;
    tracing::info!("Sensor starting. Opening pipes...");

    // 2. Samples out first, then commands in; the controller opens them in the same order.
    let samples = OpenOptions::new()
        .write(true)
        .open(&config.sample_pipe)
        .await
        .with_context(|| format!("opening {}", config.sample_pipe.display()))?;
    let commands = File::open(&config.command_pipe)
        .await
        .with_context(|| format!("opening {}", config.command_pipe.display()))?;
    tracing::info!("Pipes open. Starting vehicle simulation.");

    // 3. Simulate until the controller hangs up
    let mut sim = VehicleSim::from_config(&config);
    let ticks = run_sensor(
        &mut sim,
        samples,
        BufReader::new(commands),
        Duration::from_millis(config.tick_ms),
        None,
    )
    .await?;

    tracing::info!(ticks, "Sensor stopped");
    Ok(())
}
