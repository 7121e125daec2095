//! Native JSON alert reader

use crate::model::Alert;
use anyhow::{Context, Result};
use std::io::BufRead;

/// Read a JSON array of native alert records.
pub fn read_alert_array<R: BufRead>(reader: R) -> Result<Vec<Alert>> {
    serde_json::from_reader(reader).context("error decoding alert array")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IpAddress;

    #[test]
    fn test_read_alert_array() {
        let json = r#"[
            {
                "timestamp": "2024-03-01T12:00:00Z",
                "source_ip": "1.1.13.37",
                "destination_ip": "172.31.64.67",
                "severity": 1.0
            },
            {
                "timestamp": "2024-03-01T12:00:01Z",
                "source_ip": "172.31.64.67",
                "destination_ip": "172.31.69.20",
                "severity": 0.5,
                "true_positive": true
            }
        ]"#;

        let alerts = read_alert_array(json.as_bytes()).unwrap();
        assert_eq!(alerts.len(), 2);
        assert_eq!(alerts[0].source_ip, IpAddress::parse("1.1.13.37"));
        assert!(alerts[1].true_positive);
    }

    #[test]
    fn test_malformed_array_is_an_error() {
        assert!(read_alert_array("[{".as_bytes()).is_err());
    }
}
