//! Vehicle simulator that stands in for the real position sensor.
//!
//! Protocol per tick: drift, emit one sample line, block on exactly one
//! command line, apply it, sleep. The controller is never left waiting on a
//! sensor that is itself waiting to read.

use std::path::PathBuf;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::kernel::command::Command;

#[derive(Debug, Clone, PartialEq)]
pub struct SensorConfig {
    pub sample_pipe: PathBuf,
    pub command_pipe: PathBuf,
    pub tick_ms: u64,
    /// Added to the position every tick.
    pub drift: f64,
    /// Magnitude of one steering correction.
    pub correction: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            sample_pipe: PathBuf::from("/tmp/sensor_pipe"),
            command_pipe: PathBuf::from("/tmp/control_pipe"),
            tick_ms: 1000,
            drift: 0.05,
            correction: 0.10,
        }
    }
}

impl SensorConfig {
    /// Defaults with `SENSOR_*` environment overrides.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        use anyhow::Context;

        let mut config = Self::default();
        if let Some(v) = var("SENSOR_SAMPLE_PIPE") {
            config.sample_pipe = v.into();
        }
        if let Some(v) = var("SENSOR_COMMAND_PIPE") {
            config.command_pipe = v.into();
        }
        if let Some(v) = var("SENSOR_TICK_MS") {
            config.tick_ms = v.trim().parse().context("SENSOR_TICK_MS")?;
        }
        if let Some(v) = var("SENSOR_DRIFT") {
            config.drift = v.trim().parse().context("SENSOR_DRIFT")?;
        }
        if let Some(v) = var("SENSOR_CORRECTION") {
            config.correction = v.trim().parse().context("SENSOR_CORRECTION")?;
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VehicleSim {
    pub position: f64,
    drift: f64,
    correction: f64,
}

impl VehicleSim {
    pub fn new(drift: f64, correction: f64) -> Self {
        Self { position: 0.0, drift, correction }
    }

    pub fn from_config(config: &SensorConfig) -> Self {
        Self::new(config.drift, config.correction)
    }

    /// Apply one tick of drift and return the sample line to emit.
    pub fn advance(&mut self) -> String {
        self.position += self.drift;
        format!("POS:{:.2}\n", self.position)
    }

    /// LEFT pulls the position negative, RIGHT pushes it positive.
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::Left => self.position -= self.correction,
            Command::Right => self.position += self.correction,
            Command::None => {}
        }
    }
}

/// Drive the sensor side of the protocol. Stops after `max_ticks` samples
/// (if given) or when the command stream closes. Returns the ticks completed.
pub async fn run_sensor<W, R>(
    sim: &mut VehicleSim,
    mut samples: W,
    mut commands: R,
    period: Duration,
    max_ticks: Option<u64>,
) -> std::io::Result<u64>
where
    W: AsyncWrite + Unpin,
    R: AsyncBufRead + Unpin,
{
    let mut ticks = 0;
    let mut reply = String::new();

    while max_ticks.map_or(true, |max| ticks < max) {
        let line = sim.advance();
        samples.write_all(line.as_bytes()).await?;
        samples.flush().await?;
        info!("Position before correction: {:.2}, waiting for ECU", sim.position);

        reply.clear();
        if commands.read_line(&mut reply).await? == 0 {
            info!("Command stream closed");
            break;
        }
        match Command::from_symbol(&reply) {
            Some(command) => {
                sim.apply(command);
                info!("ECU sent {}, position now {:.2}", command, sim.position);
            }
            None => warn!("Unrecognised command {:?}", reply.trim_end()),
        }

        ticks += 1;
        if !period.is_zero() {
            tokio::time::sleep(period).await;
        }
    }

    Ok(ticks)
}
