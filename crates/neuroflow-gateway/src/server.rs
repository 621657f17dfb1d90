use crate::chat::chat_stream_handler;
use crate::observer::observer_handler;
use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use neuroflow_agent::StreamingOrchestrator;
use neuroflow_core::GraphTopology;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// Shared application state.
pub struct AppState {
    pub orchestrator: Arc<StreamingOrchestrator>,
}

/// The HTTP/WebSocket gateway.
pub struct GatewayServer;

impl GatewayServer {
    /// Build the router over a ready orchestrator.
    pub fn build(orchestrator: Arc<StreamingOrchestrator>) -> Router {
        let state = Arc::new(AppState { orchestrator });

        Router::new()
            .route("/api/v1/chat/stream", post(chat_stream_handler))
            .route("/api/v1/graph", get(graph_handler))
            .route("/ws/logs/{session_id}", get(observer_handler))
            .route("/health", get(health_handler))
            .with_state(state)
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let hub = state.orchestrator.hub();
    Json(serde_json::json!({
        "status": "ok",
        "service": "neuroflow",
        "observers": hub.observer_count().await,
        "sessions": state.orchestrator.sessions().len(),
    }))
}

/// Query parameters of the graph endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct GraphQuery {
    /// Keep only the N heaviest nodes.
    pub limit: Option<usize>,
    /// Return the subgraph around nodes mentioned in this text.
    pub focus: Option<String>,
}

async fn graph_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GraphQuery>,
) -> Json<GraphTopology> {
    let heat = state.orchestrator.heat();
    let topology = match query.focus.as_deref().map(str::trim) {
        Some(focus) if !focus.is_empty() => heat.dynamic_subgraph(focus),
        _ => match query.limit {
            Some(limit) => heat.get_topology(Some(limit)),
            None => heat.topology(),
        },
    };
    debug!(nodes = topology.nodes.len(), links = topology.links.len(), "Graph snapshot served");
    Json(topology)
}
