//! Suricata EVE JSON reader

use crate::model::{Alert, IpAddress};
use chrono::DateTime;
use serde::Deserialize;
use tracing::warn;

const MAX_SEVERITY_LEVEL: i64 = 4;

#[derive(Debug, Deserialize)]
struct SuricataLogEntry {
    #[serde(default)]
    timestamp: String,
    #[serde(rename = "src_ip", default)]
    source: String,
    #[serde(rename = "dest_ip", default)]
    destination: String,
    #[serde(default)]
    alert: SuricataAlert,
    #[serde(default)]
    true_positive: bool,
}

#[derive(Debug, Default, Deserialize)]
struct SuricataAlert {
    #[serde(default)]
    severity: i64,
}

/// Parse one EVE log line. Entries without an alert block (severity 0) are
/// filtered out; Suricata's 1 (high) .. 4 (low) scale is normalized to
/// (4 - s) / 3.
pub fn parse_suricata_line(line: &str) -> Option<Alert> {
    let entry: SuricataLogEntry = match serde_json::from_str(line) {
        Ok(entry) => entry,
        Err(error) => {
            warn!(%error, "error decoding suricata record");
            return None;
        }
    };

    if entry.alert.severity <= 0 {
        return None;
    }

    let timestamp = match DateTime::parse_from_str(&entry.timestamp, "%Y-%m-%dT%H:%M:%S%.f%z") {
        Ok(timestamp) => timestamp.to_utc(),
        Err(error) => {
            warn!(%error, timestamp = entry.timestamp, "error parsing suricata timestamp");
            return None;
        }
    };

    let severity = (MAX_SEVERITY_LEVEL - entry.alert.severity) as f32
        / (MAX_SEVERITY_LEVEL - 1) as f32;

    Some(Alert {
        timestamp,
        source_ip: IpAddress::parse(&entry.source),
        destination_ip: IpAddress::parse(&entry.destination),
        severity,
        true_positive: entry.true_positive,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_eve_line() {
        let line = r#"{"timestamp":"2024-03-01T12:00:00.000000+0000","src_ip":"1.1.13.37","dest_ip":"172.31.64.67","alert":{"severity":1},"true_positive":true}"#;

        let alert = parse_suricata_line(line).unwrap();
        assert_eq!(alert.source_ip, IpAddress::parse("1.1.13.37"));
        assert_eq!(alert.severity, 1.0);
        assert!(alert.true_positive);
    }

    #[test]
    fn test_severity_normalization() {
        let line = r#"{"timestamp":"2024-03-01T12:00:00.000000+0000","src_ip":"1.1.1.1","dest_ip":"10.0.0.1","alert":{"severity":4}}"#;
        let alert = parse_suricata_line(line).unwrap();
        assert_eq!(alert.severity, 0.0);

        let line = r#"{"timestamp":"2024-03-01T12:00:00.000000+0000","src_ip":"1.1.1.1","dest_ip":"10.0.0.1","alert":{"severity":2}}"#;
        let alert = parse_suricata_line(line).unwrap();
        assert!((alert.severity - 2.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_entries_without_alert_block_are_skipped() {
        let line = r#"{"timestamp":"2024-03-01T12:00:00.000000+0000","src_ip":"1.1.1.1","dest_ip":"10.0.0.1"}"#;
        assert!(parse_suricata_line(line).is_none());
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        assert!(parse_suricata_line("not json").is_none());
    }
}
