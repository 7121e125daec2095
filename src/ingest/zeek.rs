//! Zeek JSON reader

use crate::model::{Alert, IpAddress};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct ZeekAlert {
    #[serde(rename = "ts", default)]
    timestamp: f64,
    #[serde(rename = "src", default)]
    source: String,
    #[serde(rename = "dst", default)]
    destination: String,
    #[serde(default)]
    true_positive: bool,
}

/// Parse one Zeek JSON line. Zeek notices carry no severity; every record
/// is taken at full severity with its epoch-float timestamp split into
/// seconds and nanoseconds.
pub fn parse_zeek_line(line: &str) -> Option<Alert> {
    let entry: ZeekAlert = match serde_json::from_str(line) {
        Ok(entry) => entry,
        Err(error) => {
            warn!(%error, "error decoding zeek record");
            return None;
        }
    };

    let seconds = entry.timestamp as i64;
    let nanoseconds = ((entry.timestamp - seconds as f64) * 1_000_000_000.0) as u32;
    let timestamp = DateTime::<Utc>::from_timestamp(seconds, nanoseconds)?;

    Some(Alert {
        timestamp,
        source_ip: IpAddress::parse(&entry.source),
        destination_ip: IpAddress::parse(&entry.destination),
        severity: 1.0,
        true_positive: entry.true_positive,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_zeek_line() {
        let line = r#"{"uid":"C1","ts":1709294400.25,"src":"10.0.0.1","dst":"10.0.0.2","true_positive":false}"#;

        let alert = parse_zeek_line(line).unwrap();
        assert_eq!(alert.source_ip, IpAddress::parse("10.0.0.1"));
        assert_eq!(alert.severity, 1.0);
        assert_eq!(alert.timestamp.timestamp(), 1709294400);
        assert_eq!(alert.timestamp.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        assert!(parse_zeek_line("{broken").is_none());
    }
}
