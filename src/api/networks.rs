//! Network API endpoints

use axum::{
    extract::Path,
    routing::{delete, get, post},
    Json, Router,
};
use bollard::network::{CreateNetworkOptions, InspectNetworkOptions, ListNetworksOptions};
use serde::Deserialize;
use tracing::info;

use dockhand_core::Error;

use super::error::{docker_err, ApiError};
use super::ApiResponse;
use crate::middleware::auth::RequireApiKey;

/// Create the networks router
pub fn networks_routes() -> Router {
    Router::new()
        .route("/api/v1/networks", get(list_networks))
        .route("/api/v1/networks", post(create_network))
        .route("/api/v1/networks/:id", get(inspect_network))
        .route("/api/v1/networks/:id", delete(remove_network))
}

async fn list_networks(
    RequireApiKey: RequireApiKey,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    let networks = docker
        .list_networks(None::<ListNetworksOptions<String>>)
        .await
        .map_err(Error::from)?;

    Ok(Json(ApiResponse::success(
        networks
            .into_iter()
            .map(|n| serde_json::to_value(n).unwrap_or_default())
            .collect(),
    )))
}

async fn inspect_network(
    RequireApiKey: RequireApiKey,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    let detail = docker
        .inspect_network(&id, None::<InspectNetworkOptions<String>>)
        .await
        .map_err(|e| docker_err(e, || Error::PathNotFound(format!("network not found: {id}"))))?;

    Ok(Json(ApiResponse::success(
        serde_json::to_value(detail).unwrap_or_default(),
    )))
}

#[derive(Debug, Deserialize)]
struct CreateNetworkBody {
    name: String,
    #[serde(default = "default_driver")]
    driver: String,
}

fn default_driver() -> String {
    "bridge".to_string()
}

async fn create_network(
    RequireApiKey: RequireApiKey,
    Json(body): Json<CreateNetworkBody>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    let created = docker
        .create_network(CreateNetworkOptions {
            name: body.name.clone(),
            driver: body.driver,
            ..Default::default()
        })
        .await
        .map_err(Error::from)?;

    info!(network = %body.name, "network created");
    Ok(Json(ApiResponse::success(
        serde_json::to_value(created).unwrap_or_default(),
    )))
}

async fn remove_network(
    RequireApiKey: RequireApiKey,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    docker
        .remove_network(&id)
        .await
        .map_err(|e| docker_err(e, || Error::PathNotFound(format!("network not found: {id}"))))?;

    info!(network = %id, "network removed");
    Ok(Json(ApiResponse::success(id)))
}
