//! WebSocket module for Dockhand
//!
//! Provides real-time endpoints:
//! - /ws/events - Docker daemon event stream
//! - /ws/containers/summary - one-shot container summary stream

pub mod events;
pub mod summary;

pub use events::events_handler;
pub use summary::summary_handler;

use axum::{routing::get, Router};

/// Create the WebSocket router
pub fn websocket_router() -> Router {
    Router::new()
        .route("/ws/events", get(events_handler))
        .route("/ws/containers/summary", get(summary_handler))
}
