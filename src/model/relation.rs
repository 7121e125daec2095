//! Directed host-to-host relation
//!
//! The edge entity of an attack graph. Immutable once constructed; after
//! ingestion a relation is owned by exactly one graph, and its id is the
//! merge key under which duplicates collapse.

use super::address::IpAddress;
use super::alert::Alert;
use super::host::HostRiskRegistry;
use super::stage::{SimplifiedStage, Victim};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a relation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct RelationId(String);

impl RelationId {
    pub fn new(id: impl Into<String>) -> Self {
        RelationId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RelationId {
    fn from(s: String) -> Self {
        RelationId(s)
    }
}

/// A directed relation between two hosts, bearing the classified stage and
/// the alert's severity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectedRelation {
    pub id: RelationId,

    #[serde(rename = "from")]
    pub source: IpAddress,

    #[serde(rename = "to")]
    pub destination: IpAddress,

    pub stage: SimplifiedStage,

    pub timestamp: DateTime<Utc>,

    /// Normalized severity. Serialized as `relevance` in the export format.
    #[serde(rename = "relevance")]
    pub severity: f32,

    #[serde(default)]
    pub true_positive: bool,
}

impl DirectedRelation {
    /// Build a relation from a classified alert.
    ///
    /// With `deduplicate` set, the id is a deterministic fingerprint of
    /// source, destination, stage and severity so repeated alerts collapse
    /// onto one relation; otherwise every alert gets a random id.
    pub fn from_alert(alert: &Alert, stage: SimplifiedStage, deduplicate: bool) -> Self {
        let id = if deduplicate {
            RelationId::new(format!(
                "{}-{}-{}-{}",
                alert.source_ip,
                alert.destination_ip,
                stage as u8,
                alert.severity
            ))
        } else {
            RelationId::new(Uuid::new_v4().to_string())
        };

        DirectedRelation {
            id,
            source: alert.source_ip,
            destination: alert.destination_ip,
            stage,
            timestamp: alert.timestamp,
            severity: alert.severity,
            true_positive: alert.true_positive,
        }
    }

    /// The endpoint this relation's stage designates as the victim.
    pub fn victim(&self) -> IpAddress {
        match self.stage.victim() {
            Victim::Source => self.source,
            Victim::Destination => self.destination,
        }
    }

    /// Relevance contribution: severity scaled by the victim host's risk.
    pub fn relevance(&self, risks: &HostRiskRegistry) -> f32 {
        self.severity * risks.level_of(self.victim()).0
    }

    /// Render this relation as a labeled directed edge in DOT syntax, with
    /// both node declarations. Public endpoints are colored red and can be
    /// collapsed to an `Internet-` pseudo-node with `simplify`.
    pub fn to_dot(&self, risks: &HostRiskRegistry, simplify: bool) -> String {
        let color_src = if self.source.is_private() { "blue" } else { "red" };
        let color_dst = if self.destination.is_private() { "blue" } else { "red" };
        let risk_src = risks.level_of(self.source).0;
        let risk_dst = risks.level_of(self.destination).0;

        let mut src = self.source.to_string();
        let mut dst = self.destination.to_string();

        if simplify {
            if !self.source.is_private() {
                src = format!("Internet-{}", dst);
            }
            if !self.destination.is_private() {
                dst = format!("Internet-{}", src);
            }
        }

        let stages = self
            .stage
            .kill_chain_stages()
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(" ");

        format!(
            "\"{src}\" [color=\"{color_src}\" risk={risk_src}]\n\
             \"{dst}\" [color=\"{color_dst}\" risk={risk_dst}]\n\
             \"{src}\" -> \"{dst}\" [label=\"[{stages}]\" date={date} weight={weight}];",
            date = self.timestamp.timestamp(),
            weight = self.severity,
        )
    }
}

impl PartialEq for DirectedRelation {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DirectedRelation {}

impl std::hash::Hash for DirectedRelation {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::host::RiskLevel;
    use chrono::TimeZone;

    fn alert(source: &str, destination: &str, severity: f32) -> Alert {
        Alert {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            source_ip: IpAddress::parse(source),
            destination_ip: IpAddress::parse(destination),
            severity,
            true_positive: false,
        }
    }

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = alert("10.0.0.1", "10.0.0.2", 0.5);
        let r1 = DirectedRelation::from_alert(&a, SimplifiedStage::Lateral, true);
        let r2 = DirectedRelation::from_alert(&a, SimplifiedStage::Lateral, true);
        assert_eq!(r1.id, r2.id);
        assert_eq!(r1, r2);
    }

    #[test]
    fn test_random_id_without_dedup() {
        let a = alert("10.0.0.1", "10.0.0.2", 0.5);
        let r1 = DirectedRelation::from_alert(&a, SimplifiedStage::Lateral, false);
        let r2 = DirectedRelation::from_alert(&a, SimplifiedStage::Lateral, false);
        assert_ne!(r1.id, r2.id);
    }

    #[test]
    fn test_relevance_uses_victim_risk() {
        let mut risks = HostRiskRegistry::default();

        // Lateral designates the destination as the victim.
        let lateral = DirectedRelation::from_alert(
            &alert("10.0.0.1", "10.0.0.2", 1.0),
            SimplifiedStage::Lateral,
            true,
        );
        assert_eq!(lateral.victim(), IpAddress::parse("10.0.0.2"));
        assert_eq!(lateral.relevance(&risks), 1.0);

        risks.set(IpAddress::parse("10.0.0.2"), RiskLevel::HIGH);
        assert_eq!(lateral.relevance(&risks), 1.5);

        // Exfiltration designates the source.
        let exfil = DirectedRelation::from_alert(
            &alert("10.0.0.1", "1.1.1.1", 0.5),
            SimplifiedStage::Exfiltration,
            true,
        );
        assert_eq!(exfil.victim(), IpAddress::parse("10.0.0.1"));
        assert_eq!(exfil.relevance(&risks), 0.5);
    }

    #[test]
    fn test_serde_wire_shape() {
        let relation = DirectedRelation::from_alert(
            &alert("10.0.0.1", "1.1.1.1", 1.0),
            SimplifiedStage::Exfiltration,
            true,
        );

        let value = serde_json::to_value(&relation).unwrap();
        assert_eq!(value["from"], "10.0.0.1");
        assert_eq!(value["to"], "1.1.1.1");
        assert_eq!(value["stage"], 4);
        assert_eq!(value["relevance"], 1.0);

        let back: DirectedRelation = serde_json::from_value(value).unwrap();
        assert_eq!(back, relation);
        assert_eq!(back.stage, SimplifiedStage::Exfiltration);
    }

    #[test]
    fn test_dot_rendering() {
        let risks = HostRiskRegistry::default();
        let relation = DirectedRelation::from_alert(
            &alert("10.0.0.1", "10.0.0.2", 1.0),
            SimplifiedStage::Lateral,
            true,
        );

        let dot = relation.to_dot(&risks, false);
        assert!(dot.contains("\"10.0.0.1\" -> \"10.0.0.2\""));
        assert!(dot.contains("label=\"[L S O]\""));
        assert!(dot.contains("color=\"blue\""));
    }
}
