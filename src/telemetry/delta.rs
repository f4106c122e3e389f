//! Delta Engine
//!
//! Keeps the previous snapshot and turns each new one into per-field
//! differences: (Current - Last) for integer counters, current value for
//! everything else.

use log::debug;

use super::error::CoreError;
use super::record::{Record, Schema, Value};

/// Per-interval differences between two adjacent records
#[derive(Debug, Clone, PartialEq)]
pub struct DeltaSnapshot {
    /// Same keys as the record; integers hold `current - previous`
    deltas: Record,
    /// The raw record the deltas were computed for
    current: Record,
}

impl DeltaSnapshot {
    pub fn deltas(&self) -> &Record {
        &self.deltas
    }

    pub fn current(&self) -> &Record {
        &self.current
    }

    pub fn delta(&self, key: &str) -> Option<i64> {
        self.deltas.get_int(key)
    }
}

/// A record the engine refused, handed back with the reason
#[derive(Debug)]
pub struct Rejected {
    pub error: CoreError,
    pub record: Record,
}

/// Holds the single "previous snapshot" slot of one monitored stream
pub struct DeltaEngine {
    previous: Option<Record>,
    /// Schema captured from the baseline record
    schema: Option<Schema>,
}

impl DeltaEngine {
    pub fn new() -> Self {
        Self {
            previous: None,
            schema: None,
        }
    }

    /// Feed the next record of the stream.
    ///
    /// Returns `Ok(None)` for the warm-up record (no baseline yet). On a
    /// schema mismatch the previous record is kept and the new one dropped.
    pub fn update(&mut self, current: Record) -> Result<Option<DeltaSnapshot>, CoreError> {
        self.try_update(current).map_err(|rejected| rejected.error)
    }

    /// Like [`update`](Self::update), but a refused record is returned to
    /// the caller along with the error.
    pub fn try_update(&mut self, current: Record) -> Result<Option<DeltaSnapshot>, Rejected> {
        let (previous, schema) = match (&self.previous, &self.schema) {
            (Some(previous), Some(schema)) => (previous, schema),
            _ => {
                debug!("Baseline record captured ({} fields)", current.len());
                self.schema = Some(current.schema());
                self.previous = Some(current);
                return Ok(None);
            }
        };

        let diff = schema.diff(&current);
        if !diff.is_empty() {
            return Err(Rejected {
                error: CoreError::SchemaMismatch {
                    missing: diff.missing,
                    unexpected: diff.unexpected,
                    retyped: diff.retyped,
                },
                record: current,
            });
        }

        let deltas: Record = current
            .iter()
            .map(|(key, value)| {
                let out = match (value, previous.get(key)) {
                    // Counters may wrap or reset; report the raw difference
                    (Value::Int(now), Some(Value::Int(last))) => Value::Int(now.wrapping_sub(*last)),
                    _ => value.clone(),
                };
                (key.to_string(), out)
            })
            .collect();

        self.previous = Some(current.clone());

        Ok(Some(DeltaSnapshot { deltas, current }))
    }

    /// Forget the baseline; the next update is a warm-up again
    pub fn reset(&mut self) {
        self.previous = None;
        self.schema = None;
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn has_baseline(&self) -> bool {
        self.previous.is_some()
    }
}

impl Default for DeltaEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(ts: i64, packets: i64, dropped: i64) -> Record {
        Record::new()
            .with("__tag", "a")
            .with("ts", ts)
            .with("nic_sw_rx_packets_rx", packets)
            .with("nic_sw_rx_dropped", dropped)
            .with("delay", 0.25f64)
    }

    #[test]
    fn test_first_update_is_suppressed() {
        let mut engine = DeltaEngine::new();
        assert!(!engine.has_baseline());
        assert_eq!(engine.update(record(1, 10, 0)).unwrap(), None);
        assert!(engine.has_baseline());
        assert!(engine.schema().is_some());
    }

    #[test]
    fn test_delta_per_integer_key() {
        let mut engine = DeltaEngine::new();
        engine.update(record(1_000, 100, 3)).unwrap();
        let d = engine.update(record(3_000, 175, 5)).unwrap().unwrap();

        assert_eq!(d.delta("ts"), Some(2_000));
        assert_eq!(d.delta("nic_sw_rx_packets_rx"), Some(75));
        assert_eq!(d.delta("nic_sw_rx_dropped"), Some(2));
        // Non-integers pass through from the current record
        assert_eq!(d.deltas().get("__tag"), Some(&Value::from("a")));
        assert_eq!(d.deltas().get("delay"), Some(&Value::Float(0.25)));
        // Raw current values stay reachable
        assert_eq!(d.current().get_int("ts"), Some(3_000));
        assert_eq!(d.current().get_int("nic_sw_rx_dropped"), Some(5));
    }

    #[test]
    fn test_previous_is_raw_not_delta() {
        let mut engine = DeltaEngine::new();
        engine.update(record(0, 100, 0)).unwrap();
        engine.update(record(10, 150, 0)).unwrap();
        let d = engine.update(record(20, 225, 0)).unwrap().unwrap();
        assert_eq!(d.delta("nic_sw_rx_packets_rx"), Some(75));
        assert_eq!(d.delta("ts"), Some(10));
    }

    #[test]
    fn test_negative_delta_is_not_clamped() {
        let mut engine = DeltaEngine::new();
        engine.update(record(0, 500, 0)).unwrap();
        let d = engine.update(record(10, 20, 0)).unwrap().unwrap();
        assert_eq!(d.delta("nic_sw_rx_packets_rx"), Some(-480));
    }

    #[test]
    fn test_wrapping_counter_does_not_panic() {
        let mut engine = DeltaEngine::new();
        engine.update(record(0, i64::MAX, 0)).unwrap();
        let d = engine.update(record(10, i64::MIN, 0)).unwrap().unwrap();
        assert_eq!(d.delta("nic_sw_rx_packets_rx"), Some(1));
    }

    #[test]
    fn test_missing_key_is_schema_mismatch() {
        let mut engine = DeltaEngine::new();
        engine.update(record(0, 1, 0)).unwrap();

        let short = Record::new()
            .with("__tag", "a")
            .with("ts", 10i64)
            .with("nic_sw_rx_packets_rx", 2i64)
            .with("delay", 0.25f64);
        let err = engine.update(short).unwrap_err();
        assert_eq!(
            err,
            CoreError::SchemaMismatch {
                missing: vec!["nic_sw_rx_dropped".to_string()],
                unexpected: vec![],
                retyped: vec![],
            }
        );

        // Baseline survives the rejected record
        let d = engine.update(record(20, 5, 0)).unwrap().unwrap();
        assert_eq!(d.delta("nic_sw_rx_packets_rx"), Some(4));
    }

    #[test]
    fn test_retyped_key_is_schema_mismatch() {
        let mut engine = DeltaEngine::new();
        engine.update(record(0, 1, 0)).unwrap();

        let retyped = record(10, 2, 0).with("nic_sw_rx_dropped", "zero");
        match engine.update(retyped) {
            Err(CoreError::SchemaMismatch { retyped, .. }) => {
                assert_eq!(retyped, vec!["nic_sw_rx_dropped".to_string()]);
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_rejected_record_is_handed_back() {
        let mut engine = DeltaEngine::new();
        engine.update(record(0, 1, 0)).unwrap();

        let extra = record(10, 2, 0).with("nic_hw_rx_errors", 0i64);
        let rejected = engine.try_update(extra.clone()).unwrap_err();
        assert_eq!(rejected.record, extra);
        assert!(matches!(rejected.error, CoreError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_reset_starts_new_warmup() {
        let mut engine = DeltaEngine::new();
        engine.update(record(0, 1, 0)).unwrap();
        engine.reset();
        assert!(engine.schema().is_none());
        assert_eq!(engine.update(record(10, 2, 0)).unwrap(), None);
    }
}
