//! Controller Process: owns every resource and walks the lifecycle
//! `INIT -> RUNNING -> SHUTTING_DOWN -> STOPPED`.
//!
//! The Control Loop runs on the caller's task. The Telemetry Logger runs on a
//! spawned task and is stopped cooperatively through the context's token.

use std::sync::Arc;

use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufRead, AsyncWrite, BufReader};
use tracing::{error, info, warn};

use crate::config::ControllerConfig;
use crate::error::ControllerError;
use crate::kernel::control::{ControlLoop, ControlStats};
use crate::kernel::state::ControllerContext;
use crate::kernel::time::{Clock, SystemClock};
use crate::telemetry::logger::{LoggerStats, TelemetryLogger};
use crate::telemetry::sink::TelemetrySink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Running,
    ShuttingDown,
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShutdownReport {
    pub control: ControlStats,
    pub logger: LoggerStats,
}

pub struct Controller {
    config: ControllerConfig,
    phase: Phase,
}

impl Controller {
    pub fn new(config: ControllerConfig) -> Self {
        Self { config, phase: Phase::Init }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    fn transition(&mut self, next: Phase) {
        info!(from = ?self.phase, to = ?next, "Controller phase change");
        self.phase = next;
    }

    /// Open both pipes and the sink, then run to completion.
    /// Any failure before RUNNING is returned and leaves the controller STOPPED.
    pub async fn run(&mut self) -> Result<ShutdownReport, ControllerError> {
        if self.phase != Phase::Init {
            return Err(ControllerError::AlreadyStarted);
        }

        match self.acquire().await {
            Ok((samples, commands, sink)) => {
                self.run_with(BufReader::new(samples), commands, sink, SystemClock).await
            }
            Err(e) => {
                error!("Controller startup failed: {}", e);
                self.transition(Phase::Stopped);
                Err(e)
            }
        }
    }

    // INIT. The sample pipe is opened before the command pipe, mirroring the
    // sensor's order, so the two FIFO opens rendezvous instead of deadlocking.
    async fn acquire(&self) -> Result<(File, File, TelemetrySink), ControllerError> {
        info!("Opening pipes...");
        let samples = File::open(&self.config.sample_pipe)
            .await
            .map_err(|source| ControllerError::SampleStream { path: self.config.sample_pipe.clone(), source })?;
        let commands = OpenOptions::new()
            .write(true)
            .open(&self.config.command_pipe)
            .await
            .map_err(|source| ControllerError::CommandStream { path: self.config.command_pipe.clone(), source })?;
        info!("Pipes open");

        let sink = TelemetrySink::create(&self.config.telemetry_path)?;
        Ok((samples, commands, sink))
    }

    /// RUNNING through STOPPED over already-acquired resources.
    pub async fn run_with<R, W, C>(
        &mut self,
        samples: R,
        commands: W,
        sink: TelemetrySink,
        clock: C,
    ) -> Result<ShutdownReport, ControllerError>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
        C: Clock,
    {
        if self.phase != Phase::Init {
            return Err(ControllerError::AlreadyStarted);
        }

        let ctx = Arc::new(ControllerContext::new());
        let logger = TelemetryLogger::new(ctx.clone(), sink, self.config.log_period());
        let logger_task = tokio::spawn(logger.run());

        self.transition(Phase::Running);
        let control = ControlLoop::new(samples, commands, clock, ctx.clone(), self.config.cycle_deadline())
            .run()
            .await;

        // Both stream handles were dropped when the loop returned.
        self.transition(Phase::ShuttingDown);
        ctx.shutdown.cancel();
        let logger = match logger_task.await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Telemetry logger task ended abnormally: {}", e);
                LoggerStats::default()
            }
        };

        self.transition(Phase::Stopped);
        Ok(ShutdownReport { control, logger })
    }
}
