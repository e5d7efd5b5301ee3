//! Admin API key management
//!
//! Guarded by `RequireAdmin` (X-Admin-User / X-Admin-Pass), independent of
//! whether general API auth is enabled.

use std::sync::Arc;

use axum::{
    extract::Path,
    routing::{delete, get, post},
    Extension, Json, Router,
};
use serde::Deserialize;
use tracing::info;

use dockhand_core::{ApiKey, Error};

use super::error::ApiError;
use super::ApiResponse;
use crate::middleware::auth::RequireAdmin;
use crate::server::AppState;

/// Create the admin router
pub fn admin_routes() -> Router {
    Router::new()
        .route("/api/v1/admin/keys", get(list_keys))
        .route("/api/v1/admin/keys", post(add_key))
        .route("/api/v1/admin/keys/:key", delete(delete_key))
}

async fn list_keys(
    RequireAdmin: RequireAdmin,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<ApiKey>>>, ApiError> {
    let keys = state.key_store.list().await?;
    Ok(Json(ApiResponse::success(keys)))
}

#[derive(Debug, Deserialize, Default)]
struct AddKeyBody {
    /// Explicit key value; generated when omitted
    key: Option<String>,
    note: Option<String>,
}

async fn add_key(
    RequireAdmin: RequireAdmin,
    Extension(state): Extension<Arc<AppState>>,
    body: Option<Json<AddKeyBody>>,
) -> Result<Json<ApiResponse<ApiKey>>, ApiError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let created = state.key_store.add(body.key, body.note).await?;
    info!(key_id = %created.id, "api key created");
    Ok(Json(ApiResponse::success(created)))
}

async fn delete_key(
    RequireAdmin: RequireAdmin,
    Extension(state): Extension<Arc<AppState>>,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let deleted = state.key_store.delete(&key).await?;
    if !deleted {
        return Err(Error::PathNotFound("key not found".to_string()).into());
    }
    info!("api key deleted");
    Ok(Json(ApiResponse::success("deleted".to_string())))
}
