//! HTTP server for the visualizer and mutation API

use super::handler::{
    graph_dot_handler, graph_events_handler, graph_list_handler, host_add_handler,
    host_delete_handler, host_list_handler, reset_handler,
};
use crate::engine::CorrelationEngine;
use axum::response::{Html, IntoResponse, Redirect};
use axum::routing::{delete, get};
use axum::Router;
use rust_embed::RustEmbed;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;

#[derive(RustEmbed)]
#[folder = "src/http/static/"]
struct Assets;

async fn static_handler() -> impl IntoResponse {
    let index_html = Assets::get("index.html").unwrap();
    Html(std::str::from_utf8(index_html.data.as_ref()).unwrap().to_string())
}

async fn root_handler() -> impl IntoResponse {
    Redirect::temporary("/web/")
}

/// HTTP server exposing the graph listing, host risk mutation and the
/// per-graph live update feed.
pub struct HttpServer {
    engine: Arc<CorrelationEngine>,
    listen_address: String,
}

impl HttpServer {
    /// Create a new HTTP server
    pub fn new(engine: Arc<CorrelationEngine>, listen_address: impl Into<String>) -> Self {
        Self {
            engine,
            listen_address: listen_address.into(),
        }
    }

    /// Start the HTTP server
    pub async fn start(&self) -> anyhow::Result<()> {
        let app = Router::new()
            .route("/", get(root_handler))
            .route("/web/", get(static_handler))
            .route("/api/graphs", get(graph_list_handler))
            .route("/api/graphs/:id", get(graph_dot_handler))
            .route("/api/hosts", get(host_list_handler).post(host_add_handler))
            .route("/api/hosts/:address", delete(host_delete_handler))
            .route("/api/reset", get(reset_handler))
            .route("/websocket/graphs/:id", get(graph_events_handler))
            .layer(CorsLayer::permissive())
            .with_state(Arc::clone(&self.engine));

        let listener = tokio::net::TcpListener::bind(&self.listen_address).await?;

        info!("Visit the web UI at: http://{}/web/", self.listen_address);

        axum::serve(listener, app).await?;

        Ok(())
    }
}
