//! Delta-and-rate engine for driver stats snapshots

pub mod delta;
pub mod error;
pub mod rate;
pub mod record;

pub use delta::{DeltaEngine, DeltaSnapshot, Rejected};
pub use error::CoreError;
pub use rate::{FieldMap, RateComputer, RateMetrics, RateScales};
pub use record::{Record, Schema, Value, ValueKind};
