use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ControllerError;

/// Controller settings. Loaded from defaults, then an optional JSON file
/// named by `ECU_CONFIG`, then `ECU_*` environment overrides.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub sample_pipe: PathBuf,
    pub command_pipe: PathBuf,
    pub telemetry_path: PathBuf,
    pub log_period_ms: u64,
    pub cycle_deadline_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            sample_pipe: PathBuf::from("/tmp/sensor_pipe"),
            command_pipe: PathBuf::from("/tmp/control_pipe"),
            telemetry_path: PathBuf::from("telemetria_log.csv"),
            log_period_ms: 2000,
            cycle_deadline_ms: 10,
        }
    }
}

impl ControllerConfig {
    pub fn load() -> Result<Self, ControllerError> {
        Self::load_from(|key| std::env::var(key).ok())
    }

    /// Same as [`ControllerConfig::load`] with an injectable variable lookup.
    pub fn load_from(var: impl Fn(&str) -> Option<String>) -> Result<Self, ControllerError> {
        let mut config = match var("ECU_CONFIG") {
            Some(path) => {
                let text = std::fs::read_to_string(&path)
                    .map_err(|e| ControllerError::Config(format!("cannot read {}: {}", path, e)))?;
                serde_json::from_str(&text)
                    .map_err(|e| ControllerError::Config(format!("cannot parse {}: {}", path, e)))?
            }
            None => Self::default(),
        };

        if let Some(v) = var("ECU_SAMPLE_PIPE") {
            config.sample_pipe = v.into();
        }
        if let Some(v) = var("ECU_COMMAND_PIPE") {
            config.command_pipe = v.into();
        }
        if let Some(v) = var("ECU_TELEMETRY_PATH") {
            config.telemetry_path = v.into();
        }
        if let Some(v) = var("ECU_LOG_PERIOD_MS") {
            config.log_period_ms = parse_ms("ECU_LOG_PERIOD_MS", &v)?;
        }
        if let Some(v) = var("ECU_CYCLE_DEADLINE_MS") {
            config.cycle_deadline_ms = parse_ms("ECU_CYCLE_DEADLINE_MS", &v)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ControllerError> {
        if self.log_period_ms == 0 {
            return Err(ControllerError::Config("log_period_ms must be positive".into()));
        }
        if self.cycle_deadline_ms == 0 {
            return Err(ControllerError::Config("cycle_deadline_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn log_period(&self) -> Duration {
        Duration::from_millis(self.log_period_ms)
    }

    pub fn cycle_deadline(&self) -> Duration {
        Duration::from_millis(self.cycle_deadline_ms)
    }
}

fn parse_ms(key: &str, value: &str) -> Result<u64, ControllerError> {
    value
        .trim()
        .parse()
        .map_err(|_| ControllerError::Config(format!("{} must be a whole number of milliseconds, got {:?}", key, value)))
}
