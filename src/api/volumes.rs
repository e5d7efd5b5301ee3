//! Volume API endpoints
//!
//! Besides the usual CRUD surface, `/volumes/:name/files` browses a volume's
//! data directory through the host filesystem. The requested path is
//! canonicalized and must stay inside the volume mountpoint; symlinks that
//! point outside it are refused.

use std::path::Path as StdPath;
use std::sync::Arc;
use std::time::UNIX_EPOCH;

use axum::{
    extract::{Path, Query},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use bollard::container::ListContainersOptions;
use bollard::volume::{CreateVolumeOptions, ListVolumesOptions, RemoveVolumeOptions};
use serde::Deserialize;
use tracing::info;

use dockhand_core::{
    DirectoryEntry, EntryType, Error, FileContent, PathView, MAX_TEXT_FILE_SIZE,
};

use super::error::{docker_err, ApiError};
use super::ApiResponse;
use crate::middleware::auth::RequireApiKey;
use crate::server::AppState;

/// Create the volumes router
pub fn volumes_routes() -> Router {
    Router::new()
        .route("/api/v1/volumes", get(list_volumes))
        .route("/api/v1/volumes", post(create_volume))
        .route("/api/v1/volumes/:name", get(inspect_volume))
        .route("/api/v1/volumes/:name", delete(remove_volume))
        .route("/api/v1/volumes/:name/files", get(browse_volume))
}

async fn list_volumes(
    RequireApiKey: RequireApiKey,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    let response = docker
        .list_volumes(None::<ListVolumesOptions<String>>)
        .await
        .map_err(Error::from)?;

    Ok(Json(ApiResponse::success(
        response
            .volumes
            .unwrap_or_default()
            .into_iter()
            .map(|v| serde_json::to_value(v).unwrap_or_default())
            .collect(),
    )))
}

async fn inspect_volume(
    RequireApiKey: RequireApiKey,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    let detail = docker.inspect_volume(&name).await.map_err(|e| {
        docker_err(e, || Error::PathNotFound(format!("volume not found: {name}")))
    })?;

    // Names of containers (running or not) that mount this volume.
    let mut options = ListContainersOptions::<String> {
        all: true,
        ..Default::default()
    };
    options
        .filters
        .insert("volume".to_string(), vec![name.clone()]);
    let used_by: Vec<String> = docker
        .list_containers(Some(options))
        .await
        .map_err(Error::from)?
        .into_iter()
        .filter_map(|c| c.names)
        .filter_map(|names| {
            names
                .first()
                .map(|n| n.trim_start_matches('/').to_string())
        })
        .collect();

    let mut value = serde_json::to_value(detail).unwrap_or_default();
    if let serde_json::Value::Object(map) = &mut value {
        map.insert(
            "used_by_containers".to_string(),
            serde_json::to_value(used_by).unwrap_or_default(),
        );
    }
    Ok(Json(ApiResponse::success(value)))
}

#[derive(Debug, Deserialize)]
struct CreateVolumeBody {
    name: String,
}

async fn create_volume(
    RequireApiKey: RequireApiKey,
    Json(body): Json<CreateVolumeBody>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    let created = docker
        .create_volume(CreateVolumeOptions::<String> {
            name: body.name.clone(),
            ..Default::default()
        })
        .await
        .map_err(Error::from)?;

    info!(volume = %body.name, "volume created");
    Ok(Json(ApiResponse::success(
        serde_json::to_value(created).unwrap_or_default(),
    )))
}

#[derive(Debug, Deserialize)]
struct RemoveVolumeQuery {
    #[serde(default)]
    force: bool,
}

async fn remove_volume(
    RequireApiKey: RequireApiKey,
    Path(name): Path<String>,
    Query(query): Query<RemoveVolumeQuery>,
) -> Result<Json<ApiResponse<String>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    docker
        .remove_volume(&name, Some(RemoveVolumeOptions { force: query.force }))
        .await
        .map_err(|e| {
            docker_err(e, || Error::PathNotFound(format!("volume not found: {name}")))
        })?;

    info!(volume = %name, force = query.force, "volume removed");
    Ok(Json(ApiResponse::success(name)))
}

#[derive(Debug, Deserialize)]
struct BrowseQuery {
    #[serde(default = "default_path")]
    path: String,
}

fn default_path() -> String {
    "/".to_string()
}

async fn browse_volume(
    RequireApiKey: RequireApiKey,
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
    Query(query): Query<BrowseQuery>,
) -> Result<Json<PathView>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    let volume = docker.inspect_volume(&name).await.map_err(|e| {
        docker_err(e, || Error::PathNotFound(format!("volume not found: {name}")))
    })?;

    let mountpoint = state
        .host_root
        .join(volume.mountpoint.trim_start_matches('/'));
    // Same bare payload contract as the container bridge endpoints.
    let view = browse_host_dir(&mountpoint, &query.path).await?;
    Ok(Json(view))
}

/// Resolve `path` under `root` and read it, refusing anything that escapes
/// the root after symlink resolution.
async fn browse_host_dir(root: &StdPath, path: &str) -> Result<PathView, Error> {
    let root = tokio::fs::canonicalize(root)
        .await
        .map_err(|_| Error::PathNotFound(format!("volume data not reachable: {}", root.display())))?;

    let requested = root.join(path.trim_start_matches('/'));
    let target = tokio::fs::canonicalize(&requested)
        .await
        .map_err(|_| Error::PathNotFound(path.to_string()))?;
    if !target.starts_with(&root) {
        return Err(Error::TraversalDetected);
    }

    let meta = tokio::fs::metadata(&target).await?;
    if meta.is_file() {
        if meta.len() > MAX_TEXT_FILE_SIZE {
            return Err(Error::TooLarge {
                max: MAX_TEXT_FILE_SIZE,
            });
        }
        let bytes = tokio::fs::read(&target).await?;
        let content = String::from_utf8(bytes).map_err(|_| Error::BinaryNotSupported)?;
        return Ok(PathView::File(FileContent { content }));
    }

    let mut entries = Vec::new();
    let mut dir = tokio::fs::read_dir(&target).await?;
    while let Some(entry) = dir.next_entry().await? {
        let Ok(meta) = entry.metadata().await else {
            continue;
        };
        entries.push(DirectoryEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            entry_type: if meta.is_dir() {
                EntryType::Directory
            } else {
                EntryType::File
            },
            size: meta.len(),
            modified: meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64)
                .unwrap_or(0),
            is_symlink: meta.file_type().is_symlink(),
            is_mounted: true,
        });
    }
    Ok(PathView::Listing(entries))
}
