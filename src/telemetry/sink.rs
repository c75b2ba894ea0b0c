use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::kernel::state::TelemetryRecord;

pub const HEADER: [&str; 3] = ["Timestamp", "PosicaoLida", "ComandoEnviado"];

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("cannot open telemetry sink {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("telemetry row write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("telemetry sync failed: {0}")]
    Sync(#[source] std::io::Error),
}

/// Byte destination that can be forced to durable state.
pub trait DurableWrite: Write + Send {
    fn sync_data(&self) -> std::io::Result<()>;
}

impl DurableWrite for File {
    fn sync_data(&self) -> std::io::Result<()> {
        File::sync_data(self)
    }
}

/// Append-only CSV file of control cycles. Every row is synced to disk before
/// `append` returns.
pub struct TelemetrySink {
    path: PathBuf,
    writer: csv::Writer<Box<dyn DurableWrite>>,
}

impl TelemetrySink {
    /// Create (truncating) the file and write the header row.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, SinkError> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| SinkError::Open { path: path.clone(), source })?;
        Self::from_writer(path, file)
    }

    /// Wrap an already-open destination and write the header row. `path` only labels logs.
    pub fn from_writer(path: impl Into<PathBuf>, target: impl DurableWrite + 'static) -> Result<Self, SinkError> {
        let target: Box<dyn DurableWrite> = Box::new(target);
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(target);
        let mut sink = Self { path: path.into(), writer };
        sink.writer.write_record(HEADER)?;
        sink.sync()?;
        Ok(sink)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, record: &TelemetryRecord) -> Result<(), SinkError> {
        let position = format!("{:.2}", record.position);
        self.writer.write_record([
            record.timestamp.to_string().as_str(),
            position.as_str(),
            record.command.symbol(),
        ])?;
        self.sync()
    }

    fn sync(&mut self) -> Result<(), SinkError> {
        self.writer.flush().map_err(SinkError::Sync)?;
        self.writer.get_ref().sync_data().map_err(SinkError::Sync)
    }

    /// Flush and close the file.
    pub fn close(mut self) -> Result<(), SinkError> {
        self.sync()
    }
}
