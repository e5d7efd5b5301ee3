//! Container summary WebSocket handler
//!
//! One-shot stream: on connect, sends one JSON frame per container summary,
//! then closes the connection normally. Clients wanting a live view
//! reconnect at their own cadence.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    response::IntoResponse,
    Extension,
};
use tracing::{info, warn};

use crate::api::containers::fetch_summaries;
use crate::middleware::auth::RequireApiKey;
use crate::server::AppState;

/// WebSocket upgrade handler
pub async fn summary_handler(
    RequireApiKey: RequireApiKey,
    Extension(state): Extension<Arc<AppState>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>) {
    info!("summary websocket connected");

    let summaries = match fetch_summaries(state.self_id.as_deref()).await {
        Ok(summaries) => summaries,
        Err(e) => {
            warn!(error = %e, "summary fetch failed");
            let _ = socket.send(Message::Text(format!("Error: {e}"))).await;
            let _ = socket.close().await;
            return;
        }
    };

    for summary in summaries {
        let Ok(payload) = serde_json::to_string(&summary) else {
            continue;
        };
        if socket.send(Message::Text(payload)).await.is_err() {
            return;
        }
    }

    let _ = socket.close().await;
    info!("summary websocket closed");
}
