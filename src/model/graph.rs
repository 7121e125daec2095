//! Attack graph aggregate
//!
//! A connected component of directed relations with incremental relevance
//! accounting: the graph keeps a running maximum of relation relevance per
//! simplified stage, and a cached total equal to the weighted sum over the
//! current maxima. The cached total is never recomputed from history except
//! through [`AttackGraph::recompute_relevance`].

use super::host::HostRiskRegistry;
use super::relation::{DirectedRelation, RelationId};
use super::stage::SimplifiedStage;
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an attack graph.
///
/// Allocated from a monotonically increasing counter; never reused while the
/// graph is alive. Graphs are only ever merged, never split, so an id
/// disappears only by merge-absorption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct GraphId(pub u64);

impl GraphId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One row of the ranked graph listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphInfo {
    pub id: GraphId,
    pub relevance: f32,
}

/// Paginated, relevance-ordered graph listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphList {
    pub graphs: Vec<GraphInfo>,
    pub count: usize,
}

/// Serialized shape of a graph in the export format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedGraph {
    #[serde(default)]
    pub relations: Vec<DirectedRelation>,
    pub computed_relevance: f32,
}

/// A live attack graph.
#[derive(Debug, Clone)]
pub struct AttackGraph {
    relations: IndexMap<RelationId, DirectedRelation>,
    stage_relevance: FxHashMap<SimplifiedStage, f32>,
    computed_relevance: f32,
}

impl AttackGraph {
    /// Create a graph from its first relation.
    pub fn new(relation: DirectedRelation, risks: &HostRiskRegistry) -> Self {
        let mut graph = AttackGraph {
            relations: IndexMap::new(),
            stage_relevance: FxHashMap::default(),
            computed_relevance: 0.0,
        };
        graph.append(relation, risks);
        graph
    }

    /// Rebuild a graph from a list of relations, e.g. an imported save.
    ///
    /// Relevance is derived by replaying every relation against the current
    /// risk registry, so the result satisfies the same accounting invariant
    /// as a freshly grown graph.
    pub fn from_relations(
        relations: impl IntoIterator<Item = DirectedRelation>,
        risks: &HostRiskRegistry,
    ) -> Self {
        let mut graph = AttackGraph {
            relations: IndexMap::new(),
            stage_relevance: FxHashMap::default(),
            computed_relevance: 0.0,
        };
        for relation in relations {
            graph.append(relation, risks);
        }
        graph
    }

    /// Cached total relevance.
    pub fn relevance(&self) -> f32 {
        self.computed_relevance
    }

    pub fn relations(&self) -> &IndexMap<RelationId, DirectedRelation> {
        &self.relations
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }

    /// Insert a relation and fold its relevance into the stage maxima.
    ///
    /// Duplicate ids overwrite in place; since the id fingerprints source,
    /// destination, stage and severity, a duplicate carries the same stage
    /// relevance and the accounting is a no-op.
    pub fn append(&mut self, relation: DirectedRelation, risks: &HostRiskRegistry) {
        let relation_relevance = relation.relevance(risks);
        let stage = relation.stage;
        self.relations.insert(relation.id.clone(), relation);

        let existing_max = self.stage_relevance.get(&stage).copied().unwrap_or(0.0);
        if existing_max < relation_relevance {
            self.stage_relevance.insert(stage, relation_relevance);
            self.computed_relevance += (relation_relevance - existing_max) * stage.weight();
        }
    }

    /// Absorb another graph: union the relation maps and fold the other
    /// graph's per-stage maxima with the same incremental-maximum rule as
    /// [`AttackGraph::append`], at stage-summary granularity.
    pub fn merge(&mut self, other: &AttackGraph) {
        for (id, relation) in &other.relations {
            self.relations.insert(id.clone(), relation.clone());
        }

        for (&stage, &other_max) in &other.stage_relevance {
            let existing_max = self.stage_relevance.get(&stage).copied().unwrap_or(0.0);
            if existing_max < other_max {
                self.stage_relevance.insert(stage, other_max);
                self.computed_relevance += (other_max - existing_max) * stage.weight();
            }
        }
    }

    /// Full rebuild of the relevance accounting from the stored relations.
    ///
    /// The only correct way to reflect a host-risk change: stage relevance
    /// has already been folded into the cached summary and cannot be
    /// reconstructed from it. O(relations in graph).
    pub fn recompute_relevance(&mut self, risks: &HostRiskRegistry) -> f32 {
        self.stage_relevance.clear();
        self.computed_relevance = 0.0;

        for relation in self.relations.values() {
            let relation_relevance = relation.relevance(risks);
            let existing_max = self
                .stage_relevance
                .get(&relation.stage)
                .copied()
                .unwrap_or(0.0);

            if existing_max < relation_relevance {
                self.stage_relevance.insert(relation.stage, relation_relevance);
                self.computed_relevance +=
                    (relation_relevance - existing_max) * relation.stage.weight();
            }
        }

        self.computed_relevance
    }

    /// Export the graph in DOT syntax, one labeled directed edge per
    /// relation.
    pub fn to_dot(&self, risks: &HostRiskRegistry, simplify: bool) -> String {
        let mut lines = vec![
            "digraph {".to_string(),
            "node [shape=circle fontsize=16]".to_string(),
            "edge [length=100, color=gray, fontcolor=black]".to_string(),
        ];

        for relation in self.relations.values() {
            lines.push(relation.to_dot(risks, simplify));
        }

        lines.push("}".to_string());
        lines.join("\n")
    }

    /// Convert to the serialized export shape.
    pub fn to_saved(&self) -> SavedGraph {
        SavedGraph {
            relations: self.relations.values().cloned().collect(),
            computed_relevance: self.computed_relevance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::address::IpAddress;
    use crate::model::alert::Alert;
    use crate::model::host::RiskLevel;
    use crate::model::stage::classify;
    use chrono::{TimeZone, Utc};

    fn relation(source: &str, destination: &str, severity: f32, secs: u32) -> DirectedRelation {
        let alert = Alert {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, secs).unwrap(),
            source_ip: IpAddress::parse(source),
            destination_ip: IpAddress::parse(destination),
            severity,
            true_positive: false,
        };
        let stage = classify(alert.source_ip, alert.destination_ip);
        DirectedRelation::from_alert(&alert, stage, true)
    }

    #[test]
    fn test_append_accumulates_weighted_stage_maxima() {
        let risks = HostRiskRegistry::default();
        // Lateral at severity 1 and default (medium) risk: 1.0 * 1.25.
        let mut graph = AttackGraph::new(relation("10.0.0.1", "10.0.0.2", 1.0, 0), &risks);
        assert_eq!(graph.relevance(), 1.25);

        // Exfiltration adds 1.0 * 2.0.
        graph.append(relation("10.0.0.1", "1.1.1.1", 1.0, 1), &risks);
        assert_eq!(graph.relevance(), 3.25);
    }

    #[test]
    fn test_duplicate_relation_is_idempotent() {
        let risks = HostRiskRegistry::default();
        let r = relation("10.0.0.1", "10.0.0.2", 0.5, 0);

        let mut graph = AttackGraph::new(r.clone(), &risks);
        let once = graph.relevance();

        graph.append(r, &risks);
        assert_eq!(graph.relevance(), once);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_lower_severity_does_not_lower_stage_maximum() {
        let risks = HostRiskRegistry::default();
        let mut graph = AttackGraph::new(relation("10.0.0.1", "10.0.0.2", 1.0, 0), &risks);
        let before = graph.relevance();

        graph.append(relation("10.0.0.1", "10.0.0.3", 0.5, 1), &risks);
        assert_eq!(graph.relevance(), before);
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_merge_folds_stage_maxima() {
        let risks = HostRiskRegistry::default();
        let mut a = AttackGraph::new(relation("10.0.0.1", "10.0.0.2", 0.5, 0), &risks);
        let b = AttackGraph::new(relation("10.0.0.3", "10.0.0.4", 1.0, 1), &risks);

        // Both Lateral; the merged maximum is b's 1.0 * 1.25.
        a.merge(&b);
        assert_eq!(a.relevance(), 1.25);
        assert_eq!(a.len(), 2);
    }

    #[test]
    fn test_relevance_monotonic_under_append_and_merge() {
        let risks = HostRiskRegistry::default();
        let mut graph = AttackGraph::new(relation("10.0.0.1", "10.0.0.2", 0.3, 0), &risks);
        let mut last = graph.relevance();

        for (i, severity) in [0.9, 0.1, 0.5, 1.0].into_iter().enumerate() {
            graph.append(
                relation("10.0.0.1", "1.2.3.4", severity, i as u32 + 1),
                &risks,
            );
            assert!(graph.relevance() >= last);
            last = graph.relevance();
        }

        let other = AttackGraph::new(relation("10.0.0.9", "10.1.0.9", 1.0, 9), &risks);
        graph.merge(&other);
        assert!(graph.relevance() >= last);
    }

    #[test]
    fn test_recompute_matches_incremental_accounting() {
        let mut risks = HostRiskRegistry::default();
        let mut graph = AttackGraph::new(relation("10.0.0.1", "10.0.0.2", 1.0, 0), &risks);
        graph.append(relation("10.0.0.2", "10.2.0.1", 1.0, 1), &risks);
        graph.append(relation("10.0.0.1", "8.8.8.8", 0.5, 2), &risks);

        let incremental = graph.relevance();
        assert_eq!(graph.recompute_relevance(&risks), incremental);

        // After a risk change, recompute reflects the new victim risk.
        risks.set(IpAddress::parse("10.0.0.2"), RiskLevel::HIGH);
        let recomputed = graph.recompute_relevance(&risks);
        assert!(recomputed > incremental);

        let replayed = AttackGraph::from_relations(graph.relations().values().cloned(), &risks);
        assert_eq!(replayed.relevance(), recomputed);
    }

    #[test]
    fn test_saved_round_trip() {
        let risks = HostRiskRegistry::default();
        let mut graph = AttackGraph::new(relation("10.0.0.1", "10.0.0.2", 1.0, 0), &risks);
        graph.append(relation("10.0.0.2", "1.1.1.1", 1.0, 1), &risks);

        let saved = graph.to_saved();
        let json = serde_json::to_string(&saved).unwrap();
        let back: SavedGraph = serde_json::from_str(&json).unwrap();

        let restored = AttackGraph::from_relations(back.relations, &risks);
        assert_eq!(restored.relevance(), graph.relevance());
        assert_eq!(restored.len(), graph.len());
    }

    #[test]
    fn test_dot_export_contains_all_relations() {
        let risks = HostRiskRegistry::default();
        let mut graph = AttackGraph::new(relation("10.0.0.1", "10.0.0.2", 1.0, 0), &risks);
        graph.append(relation("10.0.0.2", "10.0.0.3", 1.0, 1), &risks);

        let dot = graph.to_dot(&risks, false);
        assert!(dot.starts_with("digraph {"));
        assert!(dot.ends_with('}'));
        assert!(dot.contains("\"10.0.0.1\" -> \"10.0.0.2\""));
        assert!(dot.contains("\"10.0.0.2\" -> \"10.0.0.3\""));
    }
}
