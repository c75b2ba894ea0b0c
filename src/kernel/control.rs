use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::command::{decide, Command};
use super::sample::{parse_sample, MAX_SAMPLE_LINE};
use super::state::{ControllerContext, TelemetryRecord};
use super::time::Clock;

/// Why the loop stopped reading samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    EndOfStream,
    SampleReadFailed,
    CommandWriteFailed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ControlStats {
    pub cycles: u64,
    pub skipped_lines: u64,
    pub deadline_misses: u64,
    pub max_cycle: Duration,
    pub exit: LoopExit,
}

/// Outcome of feeding one raw line through the loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Step {
    Committed(TelemetryRecord),
    Skipped,
}

/// The real-time half of the controller: read a sample, decide, reply, record.
pub struct ControlLoop<R, W, C> {
    samples: R,
    commands: W,
    clock: C,
    ctx: Arc<ControllerContext>,
    deadline: Duration,

    cycles: u64,
    skipped_lines: u64,
    deadline_misses: u64,
    max_cycle: Duration,
    line: Vec<u8>,
}

impl<R, W, C> ControlLoop<R, W, C>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    C: Clock,
{
    pub fn new(samples: R, commands: W, clock: C, ctx: Arc<ControllerContext>, deadline: Duration) -> Self {
        Self {
            samples,
            commands,
            clock,
            ctx,
            deadline,
            cycles: 0,
            skipped_lines: 0,
            deadline_misses: 0,
            max_cycle: Duration::ZERO,
            line: Vec::with_capacity(64),
        }
    }

    /// Process one raw line. Malformed lines produce no command and leave the record untouched.
    pub async fn step(&mut self, raw: &[u8]) -> std::io::Result<Step> {
        let position = match parse_sample(raw) {
            Ok(p) => p,
            Err(reason) => {
                self.skipped_lines += 1;
                debug!(?reason, "Skipping malformed sample line");
                return Ok(Step::Skipped);
            }
        };
        let started = Instant::now();

        let command = decide(position);
        match command {
            Command::Left => info!("Position {:.2}: correcting LEFT", position),
            Command::Right => info!("Position {:.2}: correcting RIGHT", position),
            Command::None => info!("Position {:.2}: holding course", position),
        }

        self.commands.write_all(command.wire_line().as_bytes()).await?;
        self.commands.flush().await?;

        let record = self.ctx.record.commit(self.clock.now_secs(), position, command);
        self.cycles += 1;

        let elapsed = started.elapsed();
        self.max_cycle = self.max_cycle.max(elapsed);
        if elapsed > self.deadline {
            self.deadline_misses += 1;
            warn!(?elapsed, deadline = ?self.deadline, "Control cycle overran its deadline");
        }

        Ok(Step::Committed(record))
    }

    /// Run until the sample stream ends or either stream fails.
    /// Consumes the loop so both stream handles are dropped exactly once on return.
    pub async fn run(mut self) -> ControlStats {
        info!("Control loop active");

        let exit = loop {
            self.line.clear();
            let mut bounded = (&mut self.samples).take(MAX_SAMPLE_LINE as u64 + 1);
            match bounded.read_until(b'\n', &mut self.line).await {
                Ok(0) => break LoopExit::EndOfStream,
                Ok(_) => {}
                Err(e) => {
                    warn!("Sample stream unreadable: {}", e);
                    break LoopExit::SampleReadFailed;
                }
            }

            // Over-long line: keep the capped prefix (it will be rejected) and drop the rest.
            if self.line.len() > MAX_SAMPLE_LINE && self.line.last() != Some(&b'\n') {
                if let Err(e) = discard_line(&mut self.samples).await {
                    warn!("Sample stream unreadable: {}", e);
                    break LoopExit::SampleReadFailed;
                }
            }

            let raw = std::mem::take(&mut self.line);
            let outcome = self.step(&raw).await;
            self.line = raw;

            if let Err(e) = outcome {
                warn!("Command stream write failed: {}", e);
                break LoopExit::CommandWriteFailed;
            }
        };

        info!(cycles = self.cycles, skipped = self.skipped_lines, ?exit, "Control loop finished");

        ControlStats {
            cycles: self.cycles,
            skipped_lines: self.skipped_lines,
            deadline_misses: self.deadline_misses,
            max_cycle: self.max_cycle,
            exit,
        }
    }
}

/// Consume bytes up to and including the next `\n`, or to end of stream.
async fn discard_line<R: AsyncBufRead + Unpin>(samples: &mut R) -> std::io::Result<()> {
    loop {
        let buf = samples.fill_buf().await?;
        if buf.is_empty() {
            return Ok(());
        }
        let available = buf.len();
        match buf.iter().position(|&b| b == b'\n') {
            Some(end) => {
                samples.consume(end + 1);
                return Ok(());
            }
            None => samples.consume(available),
        }
    }
}
