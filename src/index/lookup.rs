//! Inverted index from (host, kill-chain stage) to candidate graphs
//!
//! Two coupled maps: `relations` records, per entry and per graph, the
//! earliest timestamp at which the entry was observed within that graph;
//! `graphs` records which entries each graph owns. The two maps are kept
//! mutually consistent across every operation, merges included.

use crate::model::graph::GraphId;
use crate::model::relation::DirectedRelation;
use crate::model::stage::{preconditions_of, KillChainStage};
use crate::model::IpAddress;
use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};

/// Composite index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LookupEntry {
    pub address: IpAddress,
    pub stage: KillChainStage,
}

impl LookupEntry {
    pub fn new(address: IpAddress, stage: KillChainStage) -> Self {
        LookupEntry { address, stage }
    }
}

#[derive(Debug, Default)]
pub struct LookupTable {
    relations: FxHashMap<LookupEntry, FxHashMap<GraphId, DateTime<Utc>>>,
    graphs: FxHashMap<GraphId, FxHashSet<LookupEntry>>,
}

impl LookupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Graphs a relation could plausibly continue.
    ///
    /// Only relations originating from a private host can chain: for every
    /// precondition stage of the relation's fine-grained stage set, any
    /// graph that observed `(source, precondition)` at or before the
    /// relation's timestamp is a candidate. The causality check is
    /// non-decreasing, not strict: an equal timestamp still explains the
    /// relation.
    pub fn candidates(&self, relation: &DirectedRelation) -> FxHashSet<GraphId> {
        let mut graph_ids = FxHashSet::default();

        if !relation.source.is_private() {
            return graph_ids;
        }

        for stage in preconditions_of(relation.stage) {
            let entry = LookupEntry::new(relation.source, stage);
            if let Some(by_graph) = self.relations.get(&entry) {
                for (&graph_id, &earliest) in by_graph {
                    if earliest <= relation.timestamp {
                        graph_ids.insert(graph_id);
                    }
                }
            }
        }

        graph_ids
    }

    /// Record a relation against the graph that absorbed it.
    ///
    /// Every private endpoint is indexed under each fine-grained stage the
    /// relation's simplified stage implies, keeping the earliest timestamp
    /// per (entry, graph).
    pub fn record(&mut self, relation: &DirectedRelation, graph_id: GraphId) {
        let mut addresses = Vec::with_capacity(2);
        if relation.source.is_private() {
            addresses.push(relation.source);
        }
        if relation.destination.is_private() {
            addresses.push(relation.destination);
        }

        for address in addresses {
            for &stage in relation.stage.kill_chain_stages() {
                let entry = LookupEntry::new(address, stage);

                let earliest = self
                    .relations
                    .entry(entry)
                    .or_default()
                    .entry(graph_id)
                    .or_insert(relation.timestamp);
                if relation.timestamp < *earliest {
                    *earliest = relation.timestamp;
                }

                self.graphs.entry(graph_id).or_default().insert(entry);
            }
        }
    }

    /// Fold the bookkeeping of merged-away graphs into the survivor.
    ///
    /// Entry sets are unioned and earliest timestamps kept at their
    /// minimum; the old graphs' bookkeeping is removed entirely. Idempotent
    /// with respect to the survivor appearing in `old_ids`.
    pub fn merge_graphs(&mut self, old_ids: &FxHashSet<GraphId>, survivor: GraphId) {
        for &old_id in old_ids {
            let entries = self.graphs.get(&old_id).cloned().unwrap_or_default();

            self.graphs
                .entry(survivor)
                .or_default()
                .extend(entries.iter().copied());

            for entry in &entries {
                let Some(by_graph) = self.relations.get_mut(entry) else {
                    continue;
                };

                if let Some(old_earliest) = by_graph.get(&old_id).copied() {
                    let earliest = by_graph.entry(survivor).or_insert(old_earliest);
                    if old_earliest < *earliest {
                        *earliest = old_earliest;
                    }
                }

                if old_id != survivor {
                    by_graph.remove(&old_id);
                }
            }

            if old_id != survivor {
                self.graphs.remove(&old_id);
            }
        }
    }

    /// Entries owned by a graph. Empty for unknown graphs.
    pub fn entries_of(&self, graph_id: GraphId) -> FxHashSet<LookupEntry> {
        self.graphs.get(&graph_id).cloned().unwrap_or_default()
    }

    /// Graph ids referenced anywhere in the index.
    pub fn graph_ids(&self) -> FxHashSet<GraphId> {
        self.graphs.keys().copied().collect()
    }

    /// Check the mutual-consistency invariant between the two maps.
    pub fn is_consistent(&self) -> bool {
        for (entry, by_graph) in &self.relations {
            for graph_id in by_graph.keys() {
                match self.graphs.get(graph_id) {
                    Some(entries) if entries.contains(entry) => {}
                    _ => return false,
                }
            }
        }

        for (graph_id, entries) in &self.graphs {
            for entry in entries {
                match self.relations.get(entry) {
                    Some(by_graph) if by_graph.contains_key(graph_id) => {}
                    _ => return false,
                }
            }
        }

        true
    }

    pub fn clear(&mut self) {
        self.relations.clear();
        self.graphs.clear();
    }
}
