//! Record sources: following the stats log and decoding its lines

pub mod decode;
pub mod follow;

use thiserror::Error;

use crate::telemetry::Record;
pub use decode::{decode_line, DecodeError};
pub use follow::{FollowOptions, LogFollower, SourceError};

/// Anything that can go wrong before a record reaches the engine
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("line {line}: {source}")]
    Decode { line: u64, source: DecodeError },
}

impl IngestError {
    /// Decode errors affect one line only; the stream itself is still usable
    pub fn is_recoverable(&self) -> bool {
        matches!(self, IngestError::Decode { .. })
    }
}

/// Adapts a stream of raw lines into decoded records, each paired with its
/// line number.
///
/// Blank lines are skipped; line numbers count every line seen.
pub struct Records<I> {
    lines: I,
    line_no: u64,
}

impl<I> Records<I> {
    pub fn new(lines: I) -> Self {
        Self { lines, line_no: 0 }
    }
}

impl<I, L, E> Iterator for Records<I>
where
    I: Iterator<Item = Result<L, E>>,
    L: AsRef<[u8]>,
    IngestError: From<E>,
{
    type Item = Result<(u64, Record), IngestError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;

            if line.as_ref().iter().all(u8::is_ascii_whitespace) {
                continue;
            }

            let line_no = self.line_no;
            return Some(
                decode_line(line)
                    .map(|record| (line_no, record))
                    .map_err(|source| IngestError::Decode {
                        line: line_no,
                        source,
                    }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(input: &[&str]) -> impl Iterator<Item = Result<String, SourceError>> {
        input
            .iter()
            .map(|s| Ok(s.to_string()))
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn test_blank_lines_skipped() {
        let out: Vec<_> = Records::new(lines(&["", r#"{"ts":1}"#, "   ", r#"{"ts":2}"#])).collect();
        assert_eq!(out.len(), 2);
        let (line, record) = out[1].as_ref().unwrap();
        assert_eq!(*line, 4);
        assert_eq!(record.get_int("ts"), Some(2));
    }

    #[test]
    fn test_decode_error_carries_line_number() {
        let mut records = Records::new(lines(&[r#"{"ts":1}"#, "", "garbage"]));
        assert!(records.next().unwrap().is_ok());
        let err = records.next().unwrap().unwrap_err();
        assert!(err.is_recoverable());
        match err {
            IngestError::Decode { line, .. } => assert_eq!(line, 3),
            other => panic!("unexpected {:?}", other),
        }
        assert!(records.next().is_none());
    }

    #[test]
    fn test_invalid_utf8_is_recoverable() {
        let raw: Vec<Result<Vec<u8>, SourceError>> = vec![
            Ok(b"{\"ts\":\"\xfe\"}".to_vec()),
            Ok(b"{\"ts\":2}".to_vec()),
        ];
        let mut records = Records::new(raw.into_iter());

        let err = records.next().unwrap().unwrap_err();
        assert!(err.is_recoverable());
        assert!(matches!(
            err,
            IngestError::Decode {
                line: 1,
                source: DecodeError::InvalidUtf8(_)
            }
        ));
        assert_eq!(records.next().unwrap().unwrap().0, 2);
    }
}
