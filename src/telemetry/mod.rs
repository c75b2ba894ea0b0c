//! Durable, best-effort history of control cycles.
//!
//! # INVARIANT
//! Telemetry is a READ-ONLY observer of the shared record. It must **NEVER**
//! feed back into the decision logic, and a failed write must never reach the
//! Control Loop.

pub mod logger;
pub mod sink;
