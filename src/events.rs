//! Per-graph event fan-out
//!
//! Correlation publishes a new-relation event for every relation applied to
//! the shared state; a dedicated dispatch task invokes the subscribers of
//! the affected graph synchronously and in publish order. Subscriptions are
//! handle-based: `subscribe` returns an opaque token, `unsubscribe` by token
//! is idempotent. There is no replay of missed events.

use crate::model::graph::GraphId;
use crate::model::relation::DirectedRelation;
use rustc_hash::FxHashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::warn;

/// Event emitted for every relation applied to a graph.
#[derive(Debug, Clone)]
pub struct RelationEvent {
    pub graph_id: GraphId,
    pub relation: DirectedRelation,
    /// The graph's relevance after applying the relation.
    pub graph_relevance: f32,
    /// Risk level of the source host at publish time.
    pub source_risk: f32,
    /// Risk level of the destination host at publish time.
    pub destination_risk: f32,
}

/// Opaque subscription handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionToken {
    graph_id: GraphId,
    id: u64,
}

type EventCallback = Box<dyn Fn(&RelationEvent) + Send + Sync>;
type SubscriberMap = FxHashMap<GraphId, Vec<(u64, EventCallback)>>;

pub struct EventManager {
    subscribers: Arc<RwLock<SubscriberMap>>,
    sender: mpsc::UnboundedSender<RelationEvent>,
    next_token: AtomicU64,
}

impl EventManager {
    /// Create the manager and spawn its dispatch task. Must be called from
    /// within a tokio runtime.
    pub fn new() -> Self {
        let subscribers: Arc<RwLock<SubscriberMap>> = Arc::new(RwLock::new(FxHashMap::default()));
        let (sender, mut receiver) = mpsc::unbounded_channel::<RelationEvent>();

        let dispatch_subscribers = Arc::clone(&subscribers);
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let subscribers = match dispatch_subscribers.read() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                if let Some(callbacks) = subscribers.get(&event.graph_id) {
                    for (_, callback) in callbacks {
                        callback(&event);
                    }
                }
            }
        });

        EventManager {
            subscribers,
            sender,
            next_token: AtomicU64::new(0),
        }
    }

    /// Register a callback for events scoped to one graph id.
    pub fn subscribe(
        &self,
        graph_id: GraphId,
        callback: impl Fn(&RelationEvent) + Send + Sync + 'static,
    ) -> SubscriptionToken {
        let id = self.next_token.fetch_add(1, Ordering::Relaxed);
        let mut subscribers = match self.subscribers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        subscribers
            .entry(graph_id)
            .or_default()
            .push((id, Box::new(callback)));

        SubscriptionToken { graph_id, id }
    }

    /// Remove a subscription. Unknown or already-removed tokens are ignored.
    pub fn unsubscribe(&self, token: SubscriptionToken) {
        let mut subscribers = match self.subscribers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(callbacks) = subscribers.get_mut(&token.graph_id) {
            callbacks.retain(|(id, _)| *id != token.id);
            if callbacks.is_empty() {
                subscribers.remove(&token.graph_id);
            }
        }
    }

    /// Enqueue an event for dispatch.
    pub fn publish(&self, event: RelationEvent) {
        if self.sender.send(event).is_err() {
            warn!("event dispatch task is gone; dropping event");
        }
    }
}

impl std::fmt::Debug for EventManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventManager").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::alert::Alert;
    use crate::model::stage::classify;
    use crate::model::IpAddress;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn event(graph_id: GraphId) -> RelationEvent {
        let alert = Alert {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            source_ip: IpAddress::parse("10.0.0.1"),
            destination_ip: IpAddress::parse("10.0.0.2"),
            severity: 1.0,
            true_positive: false,
        };
        let stage = classify(alert.source_ip, alert.destination_ip);
        RelationEvent {
            graph_id,
            relation: DirectedRelation::from_alert(&alert, stage, true),
            graph_relevance: 1.25,
            source_risk: 1.0,
            destination_risk: 1.0,
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_matching_graph_events() {
        let manager = EventManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        manager.subscribe(GraphId(1), move |event| {
            let _ = tx.send(event.graph_relevance);
        });

        manager.publish(event(GraphId(1)));
        manager.publish(event(GraphId(2)));
        manager.publish(event(GraphId(1)));

        assert_eq!(rx.recv().await, Some(1.25));
        assert_eq!(rx.recv().await, Some(1.25));
        // The graph-2 event must not have been delivered.
        assert!(
            tokio::time::timeout(Duration::from_millis(50), rx.recv())
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_is_idempotent() {
        let manager = EventManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let token = manager.subscribe(GraphId(1), move |event| {
            let _ = tx.send(event.graph_id);
        });

        manager.unsubscribe(token);
        manager.unsubscribe(token);

        manager.publish(event(GraphId(1)));
        // Dropping the subscription dropped the callback and its sender.
        assert_eq!(rx.recv().await, None);
    }
}
