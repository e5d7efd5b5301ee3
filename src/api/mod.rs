//! Web API module for Dockhand
//!
//! Provides REST API endpoints for:
//! - Container management and the filesystem bridge
//! - Images, networks, volumes
//! - Compose stack grouping
//! - System information
//! - Admin API key management

pub mod admin;
pub mod containers;
pub mod error;
pub mod images;
pub mod networks;
pub mod stacks;
pub mod system;
pub mod volumes;

use axum::Router;
use serde::Serialize;

pub use error::ApiError;

/// Standard response envelope
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> ApiResponse<T> {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Create the API router with all endpoints
pub fn api_router() -> Router {
    Router::new()
        .merge(containers::containers_routes())
        .merge(images::images_routes())
        .merge(networks::networks_routes())
        .merge(volumes::volumes_routes())
        .merge(stacks::stacks_routes())
        .merge(system::system_routes())
        .merge(admin::admin_routes())
}
