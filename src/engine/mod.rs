//! Correlation engine: the two-stage pipeline and its shared state

mod correlator;
mod pool;

pub use correlator::{CorrelationEngine, GRAPHS_PER_PAGE};
pub use pool::WorkerPool;

use crate::model::RiskLevel;
use thiserror::Error;

/// Errors surfaced by the engine.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The pipeline has been shut down; submissions can no longer be
    /// accepted. Correlation correctness depends on total ordering of
    /// applied relations, so dropping mid-stream data silently is not an
    /// option.
    #[error("pipeline is closed")]
    PipelineClosed,

    /// A saved graph table could not be decoded. Existing state is left
    /// untouched.
    #[error("could not read saved graphs: {0}")]
    Import(#[from] serde_json::Error),
}

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker count for each pipeline stage. Stage 2 runs under one
    /// exclusive lock, so extra workers only overlap queue latency there.
    pub workers: usize,

    /// Risk level assumed for hosts without an explicit entry.
    pub default_risk: RiskLevel,

    /// Use deterministic relation fingerprints so identical alerts collapse
    /// onto one relation. Disable to keep every alert as its own relation.
    pub deduplicate_relations: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            workers: 1,
            default_risk: RiskLevel::MEDIUM,
            deduplicate_relations: true,
        }
    }
}
