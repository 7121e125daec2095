//! HTTP handlers for the visualizer API

use crate::engine::CorrelationEngine;
use crate::events::RelationEvent;
use crate::model::{GraphId, HostRisk, IpAddress, RiskLevel};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

/// Handler for the ranked graph listing.
pub async fn graph_list_handler(
    State(engine): State<Arc<CorrelationEngine>>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let page = params
        .get("page")
        .and_then(|page| page.parse::<i64>().ok())
        .unwrap_or(-1);

    Json(engine.graph_list(page).await)
}

/// Handler for a single graph, rendered as DOT.
pub async fn graph_dot_handler(
    State(engine): State<Arc<CorrelationEngine>>,
    Path(id): Path<u64>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let simplify = params.get("simplify").map(String::as_str) == Some("true");

    match engine.graph_dot(GraphId(id), simplify).await {
        Some(dot) => (StatusCode::OK, dot).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Handler listing host risk overrides.
pub async fn host_list_handler(
    State(engine): State<Arc<CorrelationEngine>>,
) -> impl IntoResponse {
    Json(engine.host_risks().await)
}

/// Handler registering a host risk override.
pub async fn host_add_handler(
    State(engine): State<Arc<CorrelationEngine>>,
    Json(body): Json<HostRisk>,
) -> impl IntoResponse {
    let address = IpAddress::parse(&body.ip_address);
    if !address.is_private() || address.is_unspecified() {
        return StatusCode::BAD_REQUEST;
    }

    engine
        .set_host_risk(address, RiskLevel(body.risk_level))
        .await;
    StatusCode::OK
}

/// Handler removing a host risk override.
pub async fn host_delete_handler(
    State(engine): State<Arc<CorrelationEngine>>,
    Path(address): Path<String>,
) -> impl IntoResponse {
    engine.clear_host_risk(IpAddress::parse(&address)).await;
    StatusCode::OK
}

/// Handler dropping all correlation state.
pub async fn reset_handler(State(engine): State<Arc<CorrelationEngine>>) -> impl IntoResponse {
    engine.reset().await;
    StatusCode::OK
}

#[derive(Serialize, Deserialize)]
struct LiveNode {
    address: String,
    is_private: bool,
    risk: f32,
}

#[derive(Serialize, Deserialize)]
struct LiveRelation {
    from: LiveNode,
    to: LiveNode,
    stages: String,
    timestamp: String,
    severity: f32,
}

/// Wire shape of one live-update message.
#[derive(Serialize, Deserialize)]
pub struct LiveRelationEvent {
    relation: LiveRelation,
    #[serde(rename = "relevance")]
    graph_relevance: f32,
    #[serde(rename = "id")]
    graph_id: GraphId,
}

impl From<&RelationEvent> for LiveRelationEvent {
    fn from(event: &RelationEvent) -> Self {
        let relation = &event.relation;
        let stages = relation
            .stage
            .kill_chain_stages()
            .iter()
            .map(|stage| stage.to_string())
            .collect::<Vec<_>>()
            .join(" ");

        LiveRelationEvent {
            relation: LiveRelation {
                from: LiveNode {
                    address: relation.source.to_string(),
                    is_private: relation.source.is_private(),
                    risk: event.source_risk,
                },
                to: LiveNode {
                    address: relation.destination.to_string(),
                    is_private: relation.destination.is_private(),
                    risk: event.destination_risk,
                },
                stages: format!("[{}]", stages),
                timestamp: relation.timestamp.to_rfc3339(),
                severity: relation.severity,
            },
            graph_relevance: event.graph_relevance,
            graph_id: event.graph_id,
        }
    }
}

/// Handler upgrading to the per-graph live update feed.
pub async fn graph_events_handler(
    State(engine): State<Arc<CorrelationEngine>>,
    Path(id): Path<u64>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| stream_graph_events(socket, engine, GraphId(id)))
}

async fn stream_graph_events(
    socket: WebSocket,
    engine: Arc<CorrelationEngine>,
    graph_id: GraphId,
) {
    let (forward, mut queued) = mpsc::unbounded_channel::<LiveRelationEvent>();

    let events = engine.events();
    let token = events.subscribe(graph_id, move |event| {
        let _ = forward.send(LiveRelationEvent::from(event));
    });

    let (mut sink, mut stream) = socket.split();
    loop {
        tokio::select! {
            event = queued.recv() => match event {
                Some(event) => {
                    let Ok(body) = serde_json::to_string(&event) else {
                        continue;
                    };
                    if sink.send(Message::Text(body)).await.is_err() {
                        break;
                    }
                }
                None => break,
            },
            incoming = stream.next() => match incoming {
                Some(Ok(_)) => {}
                _ => break,
            },
        }
    }

    events.unsubscribe(token);
    debug!(graph = %graph_id, "live update feed closed");
}
