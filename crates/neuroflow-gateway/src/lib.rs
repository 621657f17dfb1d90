//! HTTP and WebSocket surface for neuroflow.
//!
//! A thin axum layer over the [`StreamingOrchestrator`](neuroflow_agent::StreamingOrchestrator):
//!
//! - `POST /api/v1/chat/stream` streams the visible reply as chunked `text/plain`.
//! - `GET /api/v1/graph` returns the current graph topology.
//! - `GET /ws/logs/{session_id}` attaches a realtime observer.
//! - `GET /health` reports liveness.

/// Streaming chat endpoint.
pub mod chat;
/// Realtime observer WebSocket.
pub mod observer;
/// Router assembly and small handlers.
pub mod server;

pub use server::{AppState, GatewayServer};
