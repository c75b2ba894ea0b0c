use std::path::PathBuf;
use thiserror::Error;

use crate::telemetry::sink::SinkError;

/// Failures that stop the controller before it reaches RUNNING.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot open sample stream {path}: {source}")]
    SampleStream {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot open command stream {path}: {source}")]
    CommandStream {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("controller already started; a controller runs once")]
    AlreadyStarted,
}
