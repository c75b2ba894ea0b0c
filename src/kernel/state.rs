//! Shared Telemetry Record and the Controller Context that owns it.
//!
//! # LOCKING INVARIANT
//! The record is replaced wholesale under the lock and copied out wholesale
//! under the lock. Nobody holds the guard across I/O or an `.await`.

use std::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use super::command::Command;

/// The most recent completed control cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryRecord {
    /// Seconds since epoch. `0` means no cycle has completed yet.
    pub timestamp: i64,
    pub position: f64,
    pub command: Command,
}

impl TelemetryRecord {
    pub const EMPTY: TelemetryRecord = TelemetryRecord {
        timestamp: 0,
        position: 0.0,
        command: Command::None,
    };

    pub fn is_committed(&self) -> bool {
        self.timestamp != 0
    }
}

impl Default for TelemetryRecord {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Single-slot hand-off between the Control Loop (writer) and the Telemetry Logger (reader).
#[derive(Debug, Default)]
pub struct SharedRecord {
    slot: Mutex<TelemetryRecord>,
}

impl SharedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock only means the other side panicked mid-copy of plain
    // scalars; the record inside is still whole.
    fn lock(&self) -> MutexGuard<'_, TelemetryRecord> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the record. The timestamp is clamped so committed timestamps
    /// are positive and never go backwards. Returns what was stored.
    pub fn commit(&self, now_secs: i64, position: f64, command: Command) -> TelemetryRecord {
        let mut slot = self.lock();
        let record = TelemetryRecord {
            timestamp: now_secs.max(slot.timestamp).max(1),
            position,
            command,
        };
        *slot = record;
        record
    }

    /// Copy of the current record.
    pub fn snapshot(&self) -> TelemetryRecord {
        *self.lock()
    }
}

/// Everything the two controller tasks share. Constructed once by the
/// Controller Process and lent to both tasks behind an `Arc`.
#[derive(Debug, Default)]
pub struct ControllerContext {
    pub record: SharedRecord,
    /// Cancelled by the Controller Process to stop the Telemetry Logger.
    pub shutdown: CancellationToken,
}

impl ControllerContext {
    pub fn new() -> Self {
        Self::default()
    }
}
