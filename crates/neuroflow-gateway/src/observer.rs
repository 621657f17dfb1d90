use crate::server::AppState;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use neuroflow_channels::{RealtimeHub, Subscription};
use std::sync::Arc;
use tracing::info;

pub(crate) async fn observer_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let hub = state.orchestrator.hub().clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub, session_id))
}

/// Pump hub events into the socket until either side goes away.
async fn handle_socket(socket: WebSocket, hub: Arc<RealtimeHub>, session_id: String) {
    let Subscription {
        id,
        mut receiver,
    } = hub.subscribe(session_id.as_str()).await;
    let (mut ws_sender, mut ws_receiver) = socket.split();

    info!(observer_id = %id, session_id = %session_id, "Realtime observer connected");

    let send_task = tokio::spawn(async move {
        while let Some(event) = receiver.recv().await {
            if ws_sender.send(Message::Text(event.into())).await.is_err() {
                break;
            }
        }
    });

    // Observers only listen; inbound frames are read to notice the close.
    let recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = ws_receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = send_task => {},
        _ = recv_task => {},
    }

    hub.remove(id).await;
    info!(observer_id = %id, session_id = %session_id, "Realtime observer disconnected");
}
