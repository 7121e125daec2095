//! Core data model: addresses, alerts, stages, relations, graphs and the
//! host risk registry.

pub mod address;
pub mod alert;
pub mod graph;
pub mod host;
pub mod relation;
pub mod stage;

pub use address::IpAddress;
pub use alert::Alert;
pub use graph::{AttackGraph, GraphId, GraphInfo, GraphList, SavedGraph};
pub use host::{HostRisk, HostRiskRegistry, RiskLevel};
pub use relation::{DirectedRelation, RelationId};
pub use stage::{classify, preconditions_of, KillChainStage, SimplifiedStage, Victim};
