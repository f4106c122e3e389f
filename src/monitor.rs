//! Monitor Loop
//!
//! Pulls decoded records, runs them through the delta engine and the rate
//! computer, and hands each resulting frame to a renderer. Strictly one
//! record at a time, in arrival order.

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

use crate::render::Renderer;
use crate::source::IngestError;
use crate::telemetry::{CoreError, DeltaEngine, RateComputer, RateMetrics, Record, Rejected, Value};

/// What to do with a line that does not decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DecodeErrorPolicy {
    /// Log it and continue with the next line
    #[default]
    Skip,
    /// Stop monitoring with an error
    Abort,
}

/// What to do when a record's fields differ from the baseline's
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SchemaMismatchPolicy {
    /// Stop monitoring with an error
    #[default]
    Abort,
    /// Drop the old baseline and start over from the offending record
    Rebaseline,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorPolicy {
    pub on_decode_error: DecodeErrorPolicy,
    pub on_schema_mismatch: SchemaMismatchPolicy,
}

/// Result of one interval
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Sample {
    Rates(RateMetrics),
    /// The interval was zero or negative, so no rate exists for it
    NoRate { current_timestamp: i64, ts_delta: i64 },
}

/// One rendered update, numbered for the spinner
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub index: u64,
    #[serde(flatten)]
    pub sample: Sample,
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    /// `line` is the line of the stats log the record came from
    #[error("line {line}: {source}")]
    Core { line: u64, source: CoreError },

    #[error("failed to render: {0}")]
    Render(#[source] io::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorSummary {
    /// Records that reached the engine
    pub records: u64,
    pub frames: u64,
    /// Lines dropped because they did not decode
    pub skipped: u64,
    /// Intervals with no usable elapsed time
    pub stalled: u64,
    pub rebaselines: u64,
}

impl fmt::Display for MonitorSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} records, {} frames, {} skipped, {} stalled, {} rebaselines",
            self.records, self.frames, self.skipped, self.stalled, self.rebaselines
        )
    }
}

pub struct Monitor {
    engine: DeltaEngine,
    computer: RateComputer,
    policy: MonitorPolicy,
    summary: MonitorSummary,
}

impl Monitor {
    pub fn new(computer: RateComputer, policy: MonitorPolicy) -> Self {
        Self {
            engine: DeltaEngine::new(),
            computer,
            policy,
            summary: MonitorSummary::default(),
        }
    }

    pub fn summary(&self) -> &MonitorSummary {
        &self.summary
    }

    /// Feed one record; returns the sample for this interval, if any
    pub fn process(&mut self, record: Record) -> Result<Option<Sample>, CoreError> {
        self.summary.records += 1;
        if !self.engine.has_baseline() {
            self.log_baseline(&record);
        }

        let delta = match self.engine.try_update(record) {
            Ok(Some(delta)) => delta,
            Ok(None) => {
                self.validate_baseline()?;
                return Ok(None);
            }
            Err(Rejected {
                error: err @ CoreError::SchemaMismatch { .. },
                record,
            }) if self.policy.on_schema_mismatch == SchemaMismatchPolicy::Rebaseline => {
                warn!("{}; starting a new baseline", err);
                self.summary.rebaselines += 1;
                self.engine.reset();
                self.log_baseline(&record);
                self.engine.update(record)?;
                self.validate_baseline()?;
                return Ok(None);
            }
            Err(rejected) => return Err(rejected.error),
        };

        match self.computer.compute(&delta) {
            Ok(metrics) => Ok(Some(Sample::Rates(metrics))),
            Err(CoreError::ZeroOrNegativeInterval { ts_delta }) => {
                warn!("No rate for this interval: elapsed time is {}ns", ts_delta);
                self.summary.stalled += 1;
                let current_timestamp = delta
                    .current()
                    .get_int(&self.computer.fields().timestamp)
                    .unwrap_or_default();
                Ok(Some(Sample::NoRate {
                    current_timestamp,
                    ts_delta,
                }))
            }
            Err(err) => Err(err),
        }
    }

    fn log_baseline(&self, record: &Record) {
        match record.get(&self.computer.fields().tag) {
            Some(Value::Str(tag)) => info!("Baseline snapshot '{}' ({} fields)", tag, record.len()),
            _ => info!("Baseline snapshot ({} fields, no tag)", record.len()),
        }
    }

    fn validate_baseline(&self) -> Result<(), CoreError> {
        match self.engine.schema() {
            Some(schema) => {
                self.computer.validate(schema)?;
                debug!(
                    "Baseline schema accepted ({} fields, {} counters)",
                    schema.len(),
                    schema.counters().count()
                );
                Ok(())
            }
            None => Ok(()),
        }
    }

    /// Drive the loop until the record source ends or an error aborts it
    pub fn run<I, R>(&mut self, records: I, renderer: &mut R) -> Result<MonitorSummary, MonitorError>
    where
        I: IntoIterator<Item = Result<(u64, Record), IngestError>>,
        R: Renderer + ?Sized,
    {
        let result = self.drive(records, renderer);
        let finished = renderer.finish().map_err(MonitorError::Render);

        let summary = result?;
        finished?;
        info!("Monitor finished: {}", summary);
        Ok(summary)
    }

    fn drive<I, R>(&mut self, records: I, renderer: &mut R) -> Result<MonitorSummary, MonitorError>
    where
        I: IntoIterator<Item = Result<(u64, Record), IngestError>>,
        R: Renderer + ?Sized,
    {
        for item in records {
            let (line, record) = match item {
                Ok(numbered) => numbered,
                Err(e) if e.is_recoverable() && self.policy.on_decode_error == DecodeErrorPolicy::Skip => {
                    warn!("Skipping undecodable input: {}", e);
                    self.summary.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let sample = self
                .process(record)
                .map_err(|source| MonitorError::Core { line, source })?;

            if let Some(sample) = sample {
                let frame = Frame {
                    index: self.summary.frames,
                    sample,
                };
                renderer.render(&frame).map_err(MonitorError::Render)?;
                self.summary.frames += 1;
            }
        }

        Ok(self.summary.clone())
    }
}
