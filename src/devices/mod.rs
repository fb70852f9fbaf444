//! Implementation of devices attachable to the serial (Link Cable) port.
//!
//! These are purely virtual and exist to observe what a ROM writes to the
//! serial port without requiring a second machine on the other end: [`buffer`]
//! accumulates bytes for later inspection (used by the test harness) and
//! [`stdout`] streams them straight to the terminal for interactive debugging.

pub mod buffer;
pub mod stdout;
