//! Raw intrusion alert as handed to the engine
//!
//! Ephemeral input record, consumed once by the classification stage.
//! Address, timestamp and severity normalization is owned by the readers.

use super::address::IpAddress;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub timestamp: DateTime<Utc>,
    pub source_ip: IpAddress,
    pub destination_ip: IpAddress,
    /// Normalized severity in 0.0..=1.0.
    pub severity: f32,
    #[serde(default)]
    pub true_positive: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_deserialization() {
        let json = r#"{
            "timestamp": "2024-03-01T12:00:00Z",
            "source_ip": "1.1.13.37",
            "destination_ip": "172.31.64.67",
            "severity": 0.75
        }"#;

        let alert: Alert = serde_json::from_str(json).unwrap();
        assert_eq!(alert.source_ip, IpAddress::parse("1.1.13.37"));
        assert_eq!(alert.severity, 0.75);
        assert!(!alert.true_positive);
    }
}
