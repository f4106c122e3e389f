use serde::Deserialize;
use std::time::Duration;

use crate::monitor::{DecodeErrorPolicy, MonitorPolicy, SchemaMismatchPolicy};
use crate::source::FollowOptions;
use crate::telemetry::{FieldMap, RateScales};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Which record fields feed which metric
    #[serde(default)]
    pub fields: FieldMap,
    #[serde(default)]
    pub rates: RateScales,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Replay the existing file content before following
    pub from_start: bool,
    /// Keep waiting for new lines at end of file
    pub follow: bool,
    /// Fallback poll period when no file event arrives (ms)
    pub poll_interval_ms: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            from_start: false,
            follow: true,
            poll_interval_ms: 250,
        }
    }
}

impl SourceConfig {
    pub fn follow_options(&self) -> FollowOptions {
        FollowOptions {
            from_start: self.from_start,
            follow: self.follow,
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub on_decode_error: DecodeErrorPolicy,
    pub on_schema_mismatch: SchemaMismatchPolicy,
}

impl PolicyConfig {
    pub fn monitor_policy(&self) -> MonitorPolicy {
        MonitorPolicy {
            on_decode_error: self.on_decode_error,
            on_schema_mismatch: self.on_schema_mismatch,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Show timestamps in UTC instead of local time
    pub utc: bool,
}
