//! Single-line terminal status display
//!
//! The line is rewritten in place with a carriage return; a spinner shows
//! that frames are still arriving.

use chrono::{DateTime, Local};
use std::io::{self, Write};

use super::Renderer;
use crate::monitor::{Frame, Sample};

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const NANOS_PER_SEC: i64 = 1_000_000_000;

/// Format a nanosecond epoch timestamp for display
pub fn format_timestamp(ts_nanos: i64, utc: bool) -> String {
    let secs = ts_nanos.div_euclid(NANOS_PER_SEC);
    let nanos = ts_nanos.rem_euclid(NANOS_PER_SEC) as u32;

    match DateTime::from_timestamp(secs, nanos) {
        Some(dt) if utc => dt.format(TIME_FORMAT).to_string(),
        Some(dt) => dt.with_timezone(&Local).format(TIME_FORMAT).to_string(),
        None => ts_nanos.to_string(),
    }
}

pub fn spinner(index: u64) -> char {
    SPINNER[(index % SPINNER.len() as u64) as usize]
}

/// Text of one status line, without the trailing carriage return
pub fn format_frame(frame: &Frame, utc: bool) -> String {
    // Trailing padding clears leftovers of a longer previous line
    match &frame.sample {
        Sample::Rates(m) => format!(
            " {} Rx packet rate={:.2}/s ({:.2}b/s) Dropped={} SWOFL={} spins1={:.2} spinsR={:.2}          {}",
            format_timestamp(m.current_timestamp, utc),
            m.packet_rate_kpps,
            m.bit_rate_gbps,
            m.current_dropped_count,
            m.current_overflow_count,
            m.spin1_rate,
            m.spin_r_rate,
            spinner(frame.index)
        ),
        Sample::NoRate {
            current_timestamp,
            ts_delta,
        } => format!(
            " {} Rx no rate (interval {}ns)          {}",
            format_timestamp(*current_timestamp, utc),
            ts_delta,
            spinner(frame.index)
        ),
    }
}

pub struct StatusLine<W: Write> {
    out: W,
    utc: bool,
    /// A line is on screen without its newline yet
    open: bool,
}

impl<W: Write> StatusLine<W> {
    pub fn new(out: W, utc: bool) -> Self {
        Self {
            out,
            utc,
            open: false,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Renderer for StatusLine<W> {
    fn render(&mut self, frame: &Frame) -> io::Result<()> {
        write!(self.out, "{}\r", format_frame(frame, self.utc))?;
        self.open = true;
        self.out.flush()
    }

    fn finish(&mut self) -> io::Result<()> {
        if self.open {
            writeln!(self.out)?;
            self.open = false;
        }
        self.out.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::RateMetrics;

    fn rates(index: u64) -> Frame {
        Frame {
            index,
            sample: Sample::Rates(RateMetrics {
                packet_rate_kpps: 500.0,
                bit_rate_gbps: 32000.0,
                spin1_rate: 5000.0,
                spin_r_rate: 2000.0,
                current_timestamp: 2_000_000_000,
                current_dropped_count: 3,
                current_overflow_count: 1,
            }),
        }
    }

    #[test]
    fn test_timestamp_formatting() {
        assert_eq!(format_timestamp(2_000_000_000, true), "1970-01-01 00:00:02");
        assert_eq!(format_timestamp(1_500_000_000_999_999_999, true), "2017-07-14 02:40:00");
        // Sub-second part is truncated
        assert_eq!(format_timestamp(2_999_999_999, true), "1970-01-01 00:00:02");
    }

    #[test]
    fn test_spinner_cycles() {
        let spins: String = (0..6).map(spinner).collect();
        assert_eq!(spins, "|/-\\|/");
    }

    #[test]
    fn test_rates_line() {
        assert_eq!(
            format_frame(&rates(1), true),
            " 1970-01-01 00:00:02 Rx packet rate=500.00/s (32000.00b/s) Dropped=3 SWOFL=1 spins1=5000.00 spinsR=2000.00          /"
        );
    }

    #[test]
    fn test_no_rate_line() {
        let frame = Frame {
            index: 2,
            sample: Sample::NoRate {
                current_timestamp: 0,
                ts_delta: -5,
            },
        };
        assert_eq!(
            format_frame(&frame, true),
            " 1970-01-01 00:00:00 Rx no rate (interval -5ns)          -"
        );
    }

    #[test]
    fn test_status_line_rewrites_in_place() {
        let mut status = StatusLine::new(Vec::new(), true);
        status.render(&rates(0)).unwrap();
        status.render(&rates(1)).unwrap();
        status.finish().unwrap();

        let text = String::from_utf8(status.into_inner()).unwrap();
        assert_eq!(text.matches('\r').count(), 2);
        assert!(text.ends_with("/\r\n"));
        assert!(!text[..text.len() - 1].contains('\n'));
    }

    #[test]
    fn test_finish_without_frames_writes_nothing() {
        let mut status = StatusLine::new(Vec::new(), true);
        status.finish().unwrap();
        assert!(status.into_inner().is_empty());
    }
}
