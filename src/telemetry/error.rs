use thiserror::Error;

/// Errors raised by the delta/rate engine
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// A record's key set or key kinds differ from the stream's first record
    #[error("schema mismatch (missing: {missing:?}, unexpected: {unexpected:?}, retyped: {retyped:?})")]
    SchemaMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
        retyped: Vec<String>,
    },

    /// Two adjacent records carry identical or regressing timestamps
    #[error("elapsed interval is not positive ({ts_delta}ns)")]
    ZeroOrNegativeInterval { ts_delta: i64 },

    #[error("configured field '{field}' is not present in the record")]
    MissingField { field: String },

    #[error("configured field '{field}' is not an integer")]
    NotAnInteger { field: String },

    #[error("rate scale '{name}' must be a finite number, got {value}")]
    InvalidScale { name: &'static str, value: f64 },

    /// A finite scale still overflowed for this interval
    #[error("{metric} is not a finite number")]
    NonFiniteRate { metric: &'static str },
}
