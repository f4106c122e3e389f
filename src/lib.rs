//! Live rate monitor for NIC driver stats logs.
//!
//! The driver appends one JSON snapshot of its cumulative counters per line.
//! [`source`] follows and decodes that log, [`telemetry`] turns adjacent
//! snapshots into deltas and per-second rates, [`monitor`] drives the loop
//! and [`render`] draws the result.

pub mod config;
pub mod monitor;
pub mod render;
pub mod source;
pub mod telemetry;
pub mod utils;
