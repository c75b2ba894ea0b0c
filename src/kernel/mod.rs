//! Real-time core: decision policy, sample parsing, the shared record and the Control Loop.
//!
//! # TIMING INVARIANT
//! Nothing in this module touches the disk. The only lock on the control
//! path is the record mutex, held for a three-field copy.

pub mod command;
pub mod control;
pub mod sample;
pub mod state;
pub mod time;
