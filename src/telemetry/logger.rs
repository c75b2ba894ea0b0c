use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use super::sink::TelemetrySink;
use crate::kernel::state::ControllerContext;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggerStats {
    pub wakeups: u64,
    pub rows_written: u64,
    pub write_failures: u64,
}

/// Background task that polls the shared record on a fixed period and
/// appends it to the sink. It never signals or blocks the Control Loop.
pub struct TelemetryLogger {
    ctx: Arc<ControllerContext>,
    // Taken while a row is in the blocking pool; lost only if that write panics.
    sink: Option<TelemetrySink>,
    period: Duration,
    stats: LoggerStats,
}

impl TelemetryLogger {
    pub fn new(ctx: Arc<ControllerContext>, sink: TelemetrySink, period: Duration) -> Self {
        Self {
            ctx,
            sink: Some(sink),
            period,
            stats: LoggerStats::default(),
        }
    }

    /// Poll until `ctx.shutdown` is cancelled. Cancellation is only observed
    /// between wake-ups, so a row that has started is always finished.
    pub async fn run(mut self) -> LoggerStats {
        if let Some(sink) = &self.sink {
            info!(path = %sink.path().display(), period = ?self.period, "Telemetry logger started");
        }

        // First wake-up is one full period after start.
        let mut cadence = interval_at(Instant::now() + self.period, self.period);
        cadence.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let shutdown = self.ctx.shutdown.clone();

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = cadence.tick() => self.wake().await,
            }
        }

        if let Some(sink) = self.sink.take() {
            if let Err(e) = sink.close() {
                warn!("Telemetry sink did not close cleanly: {}", e);
            }
        }
        info!(rows = self.stats.rows_written, failures = self.stats.write_failures, "Telemetry logger stopped");
        self.stats
    }

    async fn wake(&mut self) {
        self.stats.wakeups += 1;

        // Lock held only for the copy.
        let record = self.ctx.record.snapshot();
        if !record.is_committed() {
            return;
        }

        // The sink travels into the blocking pool and back so fsync never stalls a worker.
        let Some(sink) = self.sink.take() else {
            self.stats.write_failures += 1;
            return;
        };
        let joined = tokio::task::spawn_blocking(move || {
            let mut sink = sink;
            let result = sink.append(&record);
            (sink, result)
        })
        .await;

        match joined {
            Ok((sink, result)) => {
                self.sink = Some(sink);
                match result {
                    Ok(()) => self.stats.rows_written += 1,
                    Err(e) => {
                        self.stats.write_failures += 1;
                        warn!("Telemetry row dropped: {}", e);
                    }
                }
            }
            Err(e) => {
                self.stats.write_failures += 1;
                warn!("Telemetry write task failed: {}", e);
            }
        }
    }
}
