//! Rate Computer
//!
//! Normalises counter deltas by the elapsed interval between two snapshots.
//! Which fields feed which rate is configuration, not hard-coded.

use serde::{Deserialize, Serialize};

use super::delta::DeltaSnapshot;
use super::error::CoreError;
use super::record::{Record, Schema, ValueKind};

const NANOS_PER_SEC: f64 = 1_000_000_000.0;
const BITS_PER_BYTE: f64 = 8.0;

/// Names of the record fields the rates are derived from
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct FieldMap {
    /// Schema variant identifier, informational only
    pub tag: String,
    /// Nanosecond timestamp; its delta is the interval
    pub timestamp: String,
    pub rx_packets: String,
    pub rx_bytes: String,
    pub spins_first: String,
    pub spins_more: String,
    /// Reported at its latest absolute value
    pub dropped: String,
    /// Reported at its latest absolute value
    pub overflow: String,
}

impl FieldMap {
    /// Fields whose delta feeds a rate
    pub fn delta_fields(&self) -> [&str; 5] {
        [
            &self.timestamp,
            &self.rx_packets,
            &self.rx_bytes,
            &self.spins_first,
            &self.spins_more,
        ]
    }

    /// Fields reported at their current absolute value
    pub fn pass_through_fields(&self) -> [&str; 2] {
        [&self.dropped, &self.overflow]
    }
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            tag: "__tag".to_string(),
            timestamp: "ts".to_string(),
            rx_packets: "nic_sw_rx_packets_rx".to_string(),
            rx_bytes: "nic_sw_rx_bytes_rx".to_string(),
            spins_first: "nic_sw_rx_spins_first".to_string(),
            spins_more: "nic_sw_rx_spins_more".to_string(),
            dropped: "nic_sw_rx_dropped".to_string(),
            overflow: "nic_sw_rx_swofl".to_string(),
        }
    }
}

/// Multipliers applied after per-second normalisation
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RateScales {
    pub packet_scale: f64,
    pub bit_scale: f64,
    pub spin_scale: f64,
}

impl RateScales {
    /// Every scale must be a finite number
    pub fn validate(&self) -> Result<(), CoreError> {
        let scales = [
            ("packet_scale", self.packet_scale),
            ("bit_scale", self.bit_scale),
            ("spin_scale", self.spin_scale),
        ];
        for (name, value) in scales {
            if !value.is_finite() {
                return Err(CoreError::InvalidScale { name, value });
            }
        }
        Ok(())
    }
}

impl Default for RateScales {
    fn default() -> Self {
        Self {
            packet_scale: 1.0,
            bit_scale: 1.0,
            spin_scale: 1000.0,
        }
    }
}

/// Derived values for one interval
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateMetrics {
    pub packet_rate_kpps: f64,
    pub bit_rate_gbps: f64,
    pub spin1_rate: f64,
    pub spin_r_rate: f64,
    pub current_timestamp: i64,
    pub current_dropped_count: i64,
    pub current_overflow_count: i64,
}

pub struct RateComputer {
    fields: FieldMap,
    scales: RateScales,
}

impl RateComputer {
    pub fn new(fields: FieldMap, scales: RateScales) -> Result<Self, CoreError> {
        scales.validate()?;
        Ok(Self { fields, scales })
    }

    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Check once that every configured field exists and is an integer
    pub fn validate(&self, schema: &Schema) -> Result<(), CoreError> {
        let wanted = self
            .fields
            .delta_fields()
            .into_iter()
            .chain(self.fields.pass_through_fields());

        for field in wanted {
            match schema.kind_of(field) {
                None => {
                    return Err(CoreError::MissingField {
                        field: field.to_string(),
                    })
                }
                Some(ValueKind::Other) => {
                    return Err(CoreError::NotAnInteger {
                        field: field.to_string(),
                    })
                }
                Some(ValueKind::Integer) => {}
            }
        }
        Ok(())
    }

    pub fn compute(&self, delta: &DeltaSnapshot) -> Result<RateMetrics, CoreError> {
        let ts_delta = delta_of(delta, &self.fields.timestamp)?;
        if ts_delta <= 0 {
            return Err(CoreError::ZeroOrNegativeInterval { ts_delta });
        }
        let secs = ts_delta as f64 / NANOS_PER_SEC;

        let packets = delta_of(delta, &self.fields.rx_packets)? as f64;
        let bytes = delta_of(delta, &self.fields.rx_bytes)? as f64;
        let spins1 = delta_of(delta, &self.fields.spins_first)? as f64;
        let spins_r = delta_of(delta, &self.fields.spins_more)? as f64;

        Ok(RateMetrics {
            packet_rate_kpps: finite(
                "packet_rate_kpps",
                packets / secs * self.scales.packet_scale,
            )?,
            bit_rate_gbps: finite(
                "bit_rate_gbps",
                bytes * BITS_PER_BYTE / secs * self.scales.bit_scale,
            )?,
            spin1_rate: finite("spin1_rate", spins1 / secs * self.scales.spin_scale)?,
            spin_r_rate: finite("spin_r_rate", spins_r / secs * self.scales.spin_scale)?,
            current_timestamp: current_of(delta, &self.fields.timestamp)?,
            current_dropped_count: current_of(delta, &self.fields.dropped)?,
            current_overflow_count: current_of(delta, &self.fields.overflow)?,
        })
    }
}

impl Default for RateComputer {
    fn default() -> Self {
        Self {
            fields: FieldMap::default(),
            scales: RateScales::default(),
        }
    }
}

fn finite(metric: &'static str, value: f64) -> Result<f64, CoreError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CoreError::NonFiniteRate { metric })
    }
}

fn delta_of(delta: &DeltaSnapshot, field: &str) -> Result<i64, CoreError> {
    int_field(delta.deltas(), field)
}

fn current_of(delta: &DeltaSnapshot, field: &str) -> Result<i64, CoreError> {
    int_field(delta.current(), field)
}

fn int_field(record: &Record, field: &str) -> Result<i64, CoreError> {
    match record.get(field) {
        None => Err(CoreError::MissingField {
            field: field.to_string(),
        }),
        Some(value) => value.as_int().ok_or_else(|| CoreError::NotAnInteger {
            field: field.to_string(),
        }),
    }
}
