//! Attackgraph
//!
//! A streaming correlation engine that turns a continuous feed of network
//! intrusion alerts into a ranked forest of attack graphs: directed graphs
//! of host-to-host relations annotated with kill-chain stage and severity,
//! representing inferred multi-step attacker campaigns.
//!
//! # Architecture
//!
//! Alerts flow through a two-stage pipeline. Stage 1 classifies each alert
//! into a kill-chain stage from the privacy and equality of its endpoints;
//! stage 2 correlates the resulting relation against the live graphs under
//! one exclusive critical section, using an inverted lookup index to find
//! merge candidates in sub-linear time. Graphs whose evidence overlaps are
//! merged, and a ranked structure keeps every live graph ordered by its
//! incrementally maintained relevance. Nothing ever re-scans the full alert
//! history.
//!
//! # Example Usage
//!
//! ```no_run
//! use attackgraph::engine::{CorrelationEngine, EngineConfig};
//! use attackgraph::model::{Alert, IpAddress};
//! use chrono::Utc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let engine = CorrelationEngine::new(EngineConfig::default());
//!
//! engine
//!     .submit(Alert {
//!         timestamp: Utc::now(),
//!         source_ip: IpAddress::parse("1.1.13.37"),
//!         destination_ip: IpAddress::parse("172.31.64.67"),
//!         severity: 1.0,
//!         true_positive: false,
//!     })
//!     .unwrap();
//!
//! engine.shutdown().await;
//! let list = engine.graph_list(-1).await;
//! println!("{} graphs", list.count);
//! # }
//! ```

#![warn(clippy::all)]

pub mod engine;
pub mod events;
pub mod http;
pub mod index;
pub mod ingest;
pub mod model;
pub mod ranking;
pub mod transport;

// Re-export main types for convenience
pub use engine::{CorrelationEngine, EngineConfig, EngineError};
pub use events::{EventManager, RelationEvent, SubscriptionToken};
pub use index::{LookupEntry, LookupTable};
pub use model::{
    Alert, AttackGraph, DirectedRelation, GraphId, GraphInfo, GraphList, HostRisk,
    HostRiskRegistry, IpAddress, KillChainStage, RelationId, RiskLevel, SavedGraph,
    SimplifiedStage,
};
pub use ranking::{RankedMap, ReadEfficientRankedMap, WriteEfficientRankedMap};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, VERSION);
    }
}
