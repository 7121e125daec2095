//! Alert readers
//!
//! Format-specific parsing of raw alert streams into [`Alert`] records.
//! Readers own address, timestamp and severity normalization; the engine
//! never sees format dialects. Per-record decode errors are logged and
//! skipped, since upstream logs routinely contain partial records.

mod json;
mod suricata;
mod zeek;

pub use json::read_alert_array;
pub use suricata::parse_suricata_line;
pub use zeek::parse_zeek_line;

use crate::engine::CorrelationEngine;
use crate::model::Alert;
use anyhow::Result;
use std::io::BufRead;

/// Supported alert input formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReaderKind {
    /// JSON array of native alert records.
    Json,
    /// Newline-delimited Suricata EVE JSON.
    Suricata,
    /// Newline-delimited Zeek JSON.
    Zeek,
}

impl ReaderKind {
    /// Parse one newline-delimited record. `None` for records the format
    /// filters out (and for the array-based JSON format, which has no line
    /// shape).
    pub fn parse_line(&self, line: &str) -> Option<Alert> {
        match self {
            ReaderKind::Json => None,
            ReaderKind::Suricata => parse_suricata_line(line),
            ReaderKind::Zeek => parse_zeek_line(line),
        }
    }

    /// Feed every alert from `input` into the engine.
    pub fn channel_alerts<R: BufRead>(
        &self,
        engine: &CorrelationEngine,
        input: R,
    ) -> Result<()> {
        match self {
            ReaderKind::Json => {
                for alert in read_alert_array(input)? {
                    engine.submit(alert)?;
                }
            }
            ReaderKind::Suricata | ReaderKind::Zeek => {
                for line in input.lines() {
                    let line = line?;
                    if let Some(alert) = self.parse_line(&line) {
                        engine.submit(alert)?;
                    }
                }
            }
        }

        Ok(())
    }
}
