use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncRead, ReadBuf};

use steer_ecu::kernel::command::{decide, Command};
use steer_ecu::kernel::control::{ControlLoop, LoopExit, Step};
use steer_ecu::kernel::state::{ControllerContext, TelemetryRecord};
use steer_ecu::kernel::time::{ManualClock, SystemClock};

const DEADLINE: Duration = Duration::from_secs(5);

async fn drive(input: &str) -> (String, Arc<ControllerContext>, steer_ecu::kernel::control::ControlStats) {
    let ctx = Arc::new(ControllerContext::new());
    let mut out: Vec<u8> = Vec::new();
    let stats = ControlLoop::new(input.as_bytes(), &mut out, SystemClock, ctx.clone(), DEADLINE)
        .run()
        .await;
    (String::from_utf8(out).unwrap(), ctx, stats)
}

#[test]
fn test_decision_policy_sweep() {
    for i in -200..=200 {
        let p = i as f64 / 100.0;
        let expected = if p > 0.5 {
            Command::Left
        } else if p < -0.5 {
            Command::Right
        } else {
            Command::None
        };
        assert_eq!(decide(p), expected, "position {}", p);
    }
}

#[tokio::test]
async fn test_single_sample_replies() {
    assert_eq!(drive("POS:0.73\n").await.0, "ESQUERDA\n");
    assert_eq!(drive("POS:-0.80\n").await.0, "DIREITA\n");
    assert_eq!(drive("POS:0.10\n").await.0, "NADA\n");
}

#[tokio::test]
async fn test_garbage_produces_nothing() {
    let (out, ctx, stats) = drive("garbage\n").await;

    assert!(out.is_empty(), "No command for a malformed line");
    assert_eq!(ctx.record.snapshot(), TelemetryRecord::EMPTY, "Record untouched");
    assert_eq!(stats.cycles, 0);
    assert_eq!(stats.skipped_lines, 1);
    assert_eq!(stats.exit, LoopExit::EndOfStream);
}

#[tokio::test]
async fn test_end_to_end_sequence() {
    let (out, ctx, stats) = drive("POS:0.0\nPOS:0.6\nPOS:-0.6\n").await;

    assert_eq!(out, "NADA\nESQUERDA\nDIREITA\n");
    let last = ctx.record.snapshot();
    assert_eq!(last.position, -0.6);
    assert_eq!(last.command, Command::Right);
    assert!(last.timestamp > 0);
    assert_eq!(stats.cycles, 3);
    assert_eq!(stats.deadline_misses, 0);
}

#[tokio::test]
async fn test_malformed_lines_are_skipped_in_stream() {
    let input = "POS:0.9\nnoise\nPOS:\n\nPOS:abc\nPOS:-0.9";
    let (out, ctx, stats) = drive(input).await;

    // Last line has no newline but is still a complete sample at EOF.
    assert_eq!(out, "ESQUERDA\nDIREITA\n");
    assert_eq!(ctx.record.snapshot().command, Command::Right);
    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.skipped_lines, 4);
}

#[tokio::test]
async fn test_timestamps_positive_and_monotonic() {
    let ctx = Arc::new(ControllerContext::new());
    let clock = Arc::new(ManualClock::new(1_000));
    let mut out: Vec<u8> = Vec::new();
    let mut control = ControlLoop::new(&b""[..], &mut out, clock.clone(), ctx.clone(), DEADLINE);

    let mut last = 0;
    for (now, line) in [(1_000, "POS:0.1\n"), (1_002, "POS:0.7\n"), (995, "POS:-0.7\n"), (1_010, "POS:0\n")] {
        clock.set(now);
        match control.step(line.as_bytes()).await.unwrap() {
            Step::Committed(record) => {
                assert!(record.timestamp > 0);
                assert!(record.timestamp >= last, "timestamp went backwards");
                last = record.timestamp;
            }
            Step::Skipped => panic!("well-formed sample skipped"),
        }
    }
    assert_eq!(last, 1_010);
    drop(control);
    assert_eq!(String::from_utf8(out).unwrap(), "NADA\nESQUERDA\nDIREITA\nNADA\n");
}

#[tokio::test]
async fn test_closed_command_stream_ends_loop() {
    let ctx = Arc::new(ControllerContext::new());
    let (ecu_side, sensor_side) = tokio::io::duplex(64);
    drop(sensor_side);

    let stats = ControlLoop::new(&b"POS:0.9\nPOS:0.9\n"[..], ecu_side, SystemClock, ctx.clone(), DEADLINE)
        .run()
        .await;

    assert_eq!(stats.exit, LoopExit::CommandWriteFailed);
    assert_eq!(stats.cycles, 0);
    assert!(!ctx.record.snapshot().is_committed(), "A cycle whose reply failed is not recorded");
}

#[tokio::test]
async fn test_deadline_overrun_is_monitoring_only() {
    let ctx = Arc::new(ControllerContext::new());
    let mut out: Vec<u8> = Vec::new();
    let stats = ControlLoop::new(&b"POS:0.9\nPOS:-0.9\n"[..], &mut out, SystemClock, ctx.clone(), Duration::ZERO)
        .run()
        .await;

    // Every cycle takes longer than zero, so every cycle is a miss, yet nothing is dropped.
    assert_eq!(stats.cycles, 2);
    assert_eq!(stats.deadline_misses, stats.cycles);
    assert_eq!(stats.exit, LoopExit::EndOfStream);
    assert_eq!(out, b"ESQUERDA\nDIREITA\n");

    let record = ctx.record.snapshot();
    assert!(record.is_committed());
    assert_eq!(record.command, Command::Right);
    assert_eq!(record.position, -0.9);
}

/// Sample source that serves one line and then reports a device error.
struct FaultAfterLine {
    line: &'static [u8],
    pos: usize,
}

impl AsyncRead for FaultAfterLine {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        if self.pos >= self.line.len() {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "sensor unplugged")));
        }
        let n = buf.remaining().min(self.line.len() - self.pos);
        buf.put_slice(&self.line[self.pos..self.pos + n]);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}

impl AsyncBufRead for FaultAfterLine {
    fn poll_fill_buf(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<&[u8]>> {
        let this = self.get_mut();
        if this.pos >= this.line.len() {
            return Poll::Ready(Err(io::Error::new(io::ErrorKind::Other, "sensor unplugged")));
        }
        Poll::Ready(Ok(&this.line[this.pos..]))
    }

    fn consume(mut self: Pin<&mut Self>, amt: usize) {
        self.pos = (self.pos + amt).min(self.line.len());
    }
}

#[tokio::test]
async fn test_unreadable_sample_stream_ends_loop() {
    let ctx = Arc::new(ControllerContext::new());
    let mut out: Vec<u8> = Vec::new();
    let samples = FaultAfterLine { line: b"POS:0.9\n", pos: 0 };

    let stats = ControlLoop::new(samples, &mut out, SystemClock, ctx.clone(), DEADLINE)
        .run()
        .await;

    assert_eq!(stats.exit, LoopExit::SampleReadFailed);
    assert_eq!(stats.cycles, 1);
    assert_eq!(out, b"ESQUERDA\n");
    assert_eq!(ctx.record.snapshot().command, Command::Left);
}

#[tokio::test]
async fn test_oversized_line_is_skipped_without_buffering_it() {
    let mut input = vec![b'x'; 1 << 20];
    input.extend_from_slice(b"\nPOS:0.9\n");

    let ctx = Arc::new(ControllerContext::new());
    let mut out: Vec<u8> = Vec::new();
    let stats = ControlLoop::new(&input[..], &mut out, SystemClock, ctx.clone(), DEADLINE)
        .run()
        .await;

    assert_eq!(stats.skipped_lines, 1);
    assert_eq!(stats.cycles, 1);
    assert_eq!(out, b"ESQUERDA\n");
}

#[tokio::test]
async fn test_oversized_sample_prefix_is_not_accepted() {
    // A valid-looking head on a line that runs past the limit must not steer.
    let mut line = b"POS:0.9".to_vec();
    line.resize(4096, b'0');
    line.extend_from_slice(b"\nPOS:-0.9");
    let (out, ctx, stats) = drive(std::str::from_utf8(&line).unwrap()).await;

    assert_eq!(out, "DIREITA\n");
    assert_eq!(stats.skipped_lines, 1);
    assert_eq!(ctx.record.snapshot().command, Command::Right);
}

#[tokio::test]
async fn test_unterminated_oversized_tail_reaches_end_of_stream() {
    let input = "y".repeat(10_000);
    let (out, ctx, stats) = drive(&input).await;

    assert!(out.is_empty());
    assert_eq!(stats.skipped_lines, 1);
    assert_eq!(stats.cycles, 0);
    assert_eq!(stats.exit, LoopExit::EndOfStream);
    assert!(!ctx.record.snapshot().is_committed());
}
