//! System endpoints

use std::sync::Arc;

use axum::{routing::get, Extension, Json, Router};
use bollard::container::ListContainersOptions;
use serde::Serialize;

use dockhand_core::{ids_match, Error};

use super::error::ApiError;
use super::ApiResponse;
use crate::middleware::auth::RequireApiKey;
use crate::server::AppState;

/// Create the system router
pub fn system_routes() -> Router {
    Router::new()
        .route("/api/v1/system/info", get(system_info))
        .route("/api/v1/system/self", get(system_self))
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Liveness endpoint, registered outside /api/v1 and never authenticated.
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Debug, Serialize)]
struct SystemInfo {
    version: serde_json::Value,
    info: serde_json::Value,
}

async fn system_info(
    RequireApiKey: RequireApiKey,
) -> Result<Json<ApiResponse<SystemInfo>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    let version = docker.version().await.map_err(Error::from)?;
    let info = docker.info().await.map_err(Error::from)?;

    Ok(Json(ApiResponse::success(SystemInfo {
        version: serde_json::to_value(version).unwrap_or_default(),
        info: serde_json::to_value(info).unwrap_or_default(),
    })))
}

/// Raw inspect of the container this service runs in.
///
/// The self id read from the cgroup may be a short id; when a direct
/// inspect misses, fall back to a prefix scan over all containers.
async fn system_self(
    RequireApiKey: RequireApiKey,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let Some(self_id) = state.self_id.clone() else {
        return Err(
            Error::PathNotFound("could not determine self container id".to_string()).into(),
        );
    };

    let docker = dockhand_core::connect_docker()?;
    if let Ok(detail) = docker.inspect_container(&self_id, None).await {
        return Ok(Json(ApiResponse::success(
            serde_json::to_value(detail).unwrap_or_default(),
        )));
    }

    let containers = docker
        .list_containers(Some(ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        }))
        .await
        .map_err(Error::from)?;
    let full_id = containers
        .into_iter()
        .filter_map(|c| c.id)
        .find(|id| ids_match(id, &self_id))
        .ok_or_else(|| Error::ContainerNotFound(format!("self container ({self_id})")))?;

    let detail = docker
        .inspect_container(&full_id, None)
        .await
        .map_err(Error::from)?;
    Ok(Json(ApiResponse::success(
        serde_json::to_value(detail).unwrap_or_default(),
    )))
}
