//! Incremental attack-graph correlation
//!
//! Stage 1 classifies alerts into relations with no shared state; stage 2
//! applies relations to the graph table, lookup index and ranking under a
//! single exclusive lock. Graph identity, the lookup index and the ranking
//! form one consistency domain, so the correlation step is logically
//! single-threaded regardless of pool size.

use super::pool::WorkerPool;
use super::{EngineConfig, EngineError};
use crate::events::{EventManager, RelationEvent};
use crate::index::LookupTable;
use crate::model::graph::{AttackGraph, GraphId, GraphInfo, GraphList, SavedGraph};
use crate::model::relation::DirectedRelation;
use crate::model::stage::{classify, SimplifiedStage};
use crate::model::{Alert, HostRisk, HostRiskRegistry, IpAddress, RiskLevel};
use crate::ranking::{RankedMap, WriteEfficientRankedMap};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::io::Read;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info};

/// Fixed page size of the ranked graph listing.
pub const GRAPHS_PER_PAGE: usize = 100;

/// Everything stage 2 mutates, guarded by one lock.
#[derive(Debug)]
struct CoreState {
    graphs: FxHashMap<GraphId, AttackGraph>,
    lookup: LookupTable,
    ranked: WriteEfficientRankedMap<GraphId, f32>,
    risks: HostRiskRegistry,
    next_graph_id: u64,
}

impl CoreState {
    fn new(default_risk: RiskLevel) -> Self {
        CoreState {
            graphs: FxHashMap::default(),
            lookup: LookupTable::new(),
            ranked: WriteEfficientRankedMap::new(true),
            risks: HostRiskRegistry::new(default_risk),
            next_graph_id: 0,
        }
    }

    fn allocate_graph_id(&mut self) -> GraphId {
        // Only ever touched inside the exclusive section.
        self.next_graph_id += 1;
        GraphId(self.next_graph_id)
    }

    /// Apply one relation: create, extend or merge, then update the lookup
    /// index and ranking. Returns the resulting graph id and relevance.
    fn apply(&mut self, relation: &DirectedRelation) -> (GraphId, f32) {
        let candidates = self.lookup.candidates(relation);
        let ids: Vec<GraphId> = candidates.iter().copied().collect();

        let graph_id = match ids.as_slice() {
            [] => {
                let id = self.allocate_graph_id();
                self.graphs
                    .insert(id, AttackGraph::new(relation.clone(), &self.risks));
                debug!(graph = %id, "created graph");
                id
            }
            [single] => {
                if let Some(graph) = self.graphs.get_mut(single) {
                    graph.append(relation.clone(), &self.risks);
                }
                *single
            }
            [first, rest @ ..] => {
                // Overlapping evidence: absorb every candidate into a fresh
                // graph seeded with the relation. The surviving id is the
                // minimum of the candidate ids, so a long-lived graph never
                // loses its oldest identity across merges.
                let mut merged = AttackGraph::new(relation.clone(), &self.risks);
                let survivor = rest.iter().fold(*first, |a, &b| a.min(b));

                for id in &ids {
                    if let Some(absorbed) = self.graphs.get(id) {
                        merged.merge(absorbed);
                    }
                }
                for id in &ids {
                    if *id != survivor {
                        self.graphs.remove(id);
                        self.ranked.remove(id);
                    }
                }

                self.graphs.insert(survivor, merged);
                self.lookup.merge_graphs(&candidates, survivor);
                debug!(survivor = %survivor, absorbed = ids.len() - 1, "merged graphs");
                survivor
            }
        };

        let relevance = self
            .graphs
            .get(&graph_id)
            .map(|graph| graph.relevance())
            .unwrap_or_default();

        self.ranked.insert(graph_id, relevance);
        self.lookup.record(relation, graph_id);

        (graph_id, relevance)
    }

    /// Rebuild every graph's relevance against the current risk registry
    /// and re-rank. The one genuinely expensive operation; deliberately
    /// reserved for infrequent administrator-triggered risk changes.
    fn recompute_all(&mut self) {
        let CoreState {
            graphs,
            ranked,
            risks,
            ..
        } = self;

        for (&graph_id, graph) in graphs.iter_mut() {
            ranked.insert(graph_id, graph.recompute_relevance(risks));
        }
    }
}

/// The public face of the correlation pipeline.
///
/// All shared structures are owned by the engine and live exactly as long
/// as it does; nothing here is process-global.
#[derive(Debug)]
pub struct CorrelationEngine {
    state: Arc<Mutex<CoreState>>,
    classify_pool: WorkerPool<Alert>,
    correlate_pool: WorkerPool<DirectedRelation>,
    events: Arc<EventManager>,
}

impl CorrelationEngine {
    /// Build the engine and spawn both worker pools. Must be called from
    /// within a tokio runtime.
    pub fn new(config: EngineConfig) -> Self {
        let state = Arc::new(Mutex::new(CoreState::new(config.default_risk)));
        let events = Arc::new(EventManager::new());

        let (relation_tx, relation_rx) = mpsc::unbounded_channel();

        let correlate_state = Arc::clone(&state);
        let correlate_events = Arc::clone(&events);
        let correlate_pool = WorkerPool::start(
            relation_tx.clone(),
            relation_rx,
            config.workers,
            move |relation: DirectedRelation| {
                let state = Arc::clone(&correlate_state);
                let events = Arc::clone(&correlate_events);
                async move {
                    let mut core = state.lock().await;
                    let (graph_id, relevance) = core.apply(&relation);
                    events.publish(RelationEvent {
                        graph_id,
                        source_risk: core.risks.level_of(relation.source).0,
                        destination_risk: core.risks.level_of(relation.destination).0,
                        relation,
                        graph_relevance: relevance,
                    });
                }
            },
        );

        let deduplicate = config.deduplicate_relations;
        let classify_pool = WorkerPool::new(config.workers, move |alert: Alert| {
            let relation_tx = relation_tx.clone();
            async move {
                // Partial records are routine upstream; drop them silently.
                if alert.source_ip.is_unspecified() || alert.destination_ip.is_unspecified() {
                    return;
                }

                let stage = classify(alert.source_ip, alert.destination_ip);
                if stage == SimplifiedStage::None {
                    return;
                }

                let relation = DirectedRelation::from_alert(&alert, stage, deduplicate);
                if relation_tx.send(relation).is_err() {
                    error!("correlation stage is closed; relation lost");
                }
            }
        });

        CorrelationEngine {
            state,
            classify_pool,
            correlate_pool,
            events,
        }
    }

    /// Enqueue an alert into the classification stage. Non-blocking.
    pub fn submit(&self, alert: Alert) -> Result<(), EngineError> {
        self.classify_pool.submit(alert)
    }

    /// Drain and stop both pipeline stages. No queued alert or relation is
    /// dropped; classification stops first so every relation it emitted is
    /// still correlated.
    pub async fn shutdown(&self) {
        self.classify_pool.shutdown().await;
        self.correlate_pool.shutdown().await;
        info!(alerts = self.classify_pool.processed(), "pipeline stopped");
    }

    /// Ranked graph listing, highest relevance first.
    ///
    /// A negative or out-of-range page returns the complete list.
    pub async fn graph_list(&self, page: i64) -> GraphList {
        let mut core = self.state.lock().await;
        let core = &mut *core;

        let length = core.ranked.len();
        let (mut offset, mut limit) = if page < 0 {
            (0, length)
        } else {
            let offset = page as usize * GRAPHS_PER_PAGE;
            (offset, offset + GRAPHS_PER_PAGE)
        };

        if limit > length {
            offset = 0;
            limit = length;
        }

        let mut graphs = Vec::with_capacity(limit - offset);
        for rank in offset..limit {
            if let Some((id, relevance)) = core.ranked.get(rank) {
                graphs.push(GraphInfo { id, relevance });
            }
        }

        GraphList {
            graphs,
            count: length,
        }
    }

    pub async fn graph(&self, id: GraphId) -> Option<AttackGraph> {
        self.state.lock().await.graphs.get(&id).cloned()
    }

    /// DOT rendering of one graph, or `None` for unknown ids.
    pub async fn graph_dot(&self, id: GraphId, simplify: bool) -> Option<String> {
        let core = self.state.lock().await;
        core.graphs
            .get(&id)
            .map(|graph| graph.to_dot(&core.risks, simplify))
    }

    /// Set a host's risk level and recompute every graph's relevance.
    /// Linearized with correlation under the same lock.
    pub async fn set_host_risk(&self, address: IpAddress, level: RiskLevel) {
        let mut core = self.state.lock().await;
        core.risks.set(address, level);
        core.recompute_all();
    }

    /// Remove a host's risk override and recompute every graph's relevance.
    pub async fn clear_host_risk(&self, address: IpAddress) {
        let mut core = self.state.lock().await;
        core.risks.clear(address);
        core.recompute_all();
    }

    pub async fn host_risks(&self) -> Vec<HostRisk> {
        self.state.lock().await.risks.hosts()
    }

    /// Import a previously exported graph table.
    ///
    /// The payload is parsed in full before any of it is applied, so a
    /// corrupt save never partially mutates state. Each graph's lookup
    /// entries are re-derived from its relations so subsequent correlation
    /// remains correct, and the id allocator advances past every imported
    /// id.
    pub async fn import_save<R: Read>(&self, reader: R) -> Result<(), EngineError> {
        let saved: FxHashMap<GraphId, SavedGraph> = serde_json::from_reader(reader)?;

        let mut core = self.state.lock().await;
        let core = &mut *core;

        for (graph_id, saved_graph) in saved {
            let graph = AttackGraph::from_relations(saved_graph.relations, &core.risks);

            for relation in graph.relations().values() {
                core.lookup.record(relation, graph_id);
            }

            core.ranked.insert(graph_id, graph.relevance());
            core.next_graph_id = core.next_graph_id.max(graph_id.0);
            core.graphs.insert(graph_id, graph);
        }

        info!(graphs = core.graphs.len(), "import done");
        Ok(())
    }

    /// The graph table in its serializable export shape, ordered by id.
    pub async fn export_graphs(&self) -> BTreeMap<GraphId, SavedGraph> {
        self.state
            .lock()
            .await
            .graphs
            .iter()
            .map(|(&id, graph)| (id, graph.to_saved()))
            .collect()
    }

    /// DOT renderings of every live graph, ordered by id.
    pub async fn export_dot(&self, simplify: bool) -> Vec<(GraphId, String)> {
        let core = self.state.lock().await;
        let mut rendered: Vec<(GraphId, String)> = core
            .graphs
            .iter()
            .map(|(&id, graph)| (id, graph.to_dot(&core.risks, simplify)))
            .collect();
        rendered.sort_by_key(|(id, _)| *id);
        rendered
    }

    /// Drop all graphs, lookup entries and ranking state. The id allocator
    /// keeps advancing so ids stay unique for the engine's lifetime.
    pub async fn reset(&self) {
        let mut core = self.state.lock().await;
        core.graphs.clear();
        core.lookup.clear();
        core.ranked.clear();
    }

    /// Handle to the per-graph event fan-out.
    pub fn events(&self) -> Arc<EventManager> {
        Arc::clone(&self.events)
    }

    /// Alerts handled by the classification stage so far.
    pub fn alerts_processed(&self) -> u64 {
        self.classify_pool.processed()
    }

    /// Diagnostic: verify the cross-structure invariants. Every ranked id
    /// resolves to exactly one live graph, every lookup reference points at
    /// a live graph, and the lookup's two maps agree.
    pub async fn is_consistent(&self) -> bool {
        let mut core = self.state.lock().await;
        let core = &mut *core;

        if core.ranked.len() != core.graphs.len() {
            return false;
        }
        for rank in 0..core.ranked.len() {
            match core.ranked.get(rank) {
                Some((id, _)) if core.graphs.contains_key(&id) => {}
                _ => return false,
            }
        }

        core.lookup
            .graph_ids()
            .iter()
            .all(|id| core.graphs.contains_key(id))
            && core.lookup.is_consistent()
    }
}
