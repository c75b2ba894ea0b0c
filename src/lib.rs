pub mod config;
pub mod controller;
pub mod error;
pub mod kernel;
pub mod sensor;
pub mod telemetry;

pub use config::ControllerConfig;
pub use controller::{Controller, Phase, ShutdownReport};
pub use error::ControllerError;
pub use kernel::command::Command;
