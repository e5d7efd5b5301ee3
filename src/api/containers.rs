//! Container API endpoints
//!
//! Listing, inspection, logs, lifecycle, `docker run` command strings, and
//! the filesystem bridge surface (browse / write / download).

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Extension, Json, Router,
};
use bollard::container::{
    KillContainerOptions, ListContainersOptions, LogsOptions, RemoveContainerOptions,
    RestartContainerOptions, StartContainerOptions, StopContainerOptions,
};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::info;

use dockhand_core::{parse_run_command, summarize, ContainerSummary, Download, Error, PathView};

use super::error::{docker_err, ApiError};
use super::ApiResponse;
use crate::middleware::auth::RequireApiKey;
use crate::server::AppState;

/// Create the containers router
pub fn containers_routes() -> Router {
    Router::new()
        .route("/api/v1/containers", get(list_containers))
        .route("/api/v1/containers/summary", get(summary))
        .route("/api/v1/containers/run", post(run_container))
        .route("/api/v1/containers/:id", get(inspect_container))
        .route("/api/v1/containers/:id", delete(remove_container))
        .route("/api/v1/containers/:id/logs", get(container_logs))
        .route("/api/v1/containers/:id/start", post(start_container))
        .route("/api/v1/containers/:id/stop", post(stop_container))
        .route("/api/v1/containers/:id/restart", post(restart_container))
        .route("/api/v1/containers/:id/pause", post(pause_container))
        .route("/api/v1/containers/:id/unpause", post(unpause_container))
        .route("/api/v1/containers/:id/kill", post(kill_container))
        .route("/api/v1/containers/:id/files", get(browse_files))
        .route("/api/v1/containers/:id/files", put(write_file))
        .route("/api/v1/containers/:id/download", get(download_file))
}

async fn list_containers(
    RequireApiKey: RequireApiKey,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    let containers = docker
        .list_containers(Some(ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        }))
        .await
        .map_err(Error::from)?;

    let raw = containers
        .into_iter()
        .map(|c| serde_json::to_value(c).unwrap_or_default())
        .collect();
    Ok(Json(ApiResponse::success(raw)))
}

async fn summary(
    RequireApiKey: RequireApiKey,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<ContainerSummary>>>, ApiError> {
    Ok(Json(ApiResponse::success(
        fetch_summaries(state.self_id.as_deref()).await?,
    )))
}

/// Shared with the summary WebSocket stream.
pub(crate) async fn fetch_summaries(
    self_id: Option<&str>,
) -> Result<Vec<ContainerSummary>, Error> {
    let docker = dockhand_core::connect_docker()?;
    let containers = docker
        .list_containers(Some(ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        }))
        .await?;

    Ok(containers.iter().map(|c| summarize(c, self_id)).collect())
}

async fn inspect_container(
    RequireApiKey: RequireApiKey,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    let detail = docker
        .inspect_container(&id, None)
        .await
        .map_err(|e| docker_err(e, || Error::ContainerNotFound(id.clone())))?;

    Ok(Json(ApiResponse::success(
        serde_json::to_value(detail).unwrap_or_default(),
    )))
}

#[derive(Debug, Deserialize)]
struct LogsQuery {
    #[serde(default = "default_tail")]
    tail: u32,
}

fn default_tail() -> u32 {
    2000
}

#[derive(Debug, Serialize)]
struct LogsResponse {
    logs: String,
}

async fn container_logs(
    RequireApiKey: RequireApiKey,
    Path(id): Path<String>,
    Query(query): Query<LogsQuery>,
) -> Result<Json<ApiResponse<LogsResponse>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    let mut stream = docker.logs(
        &id,
        Some(LogsOptions::<String> {
            stdout: true,
            stderr: true,
            timestamps: true,
            tail: query.tail.to_string(),
            ..Default::default()
        }),
    );

    let mut logs = String::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| docker_err(e, || Error::ContainerNotFound(id.clone())))?;
        logs.push_str(&String::from_utf8_lossy(&chunk.into_bytes()));
    }

    Ok(Json(ApiResponse::success(LogsResponse { logs })))
}

#[derive(Debug, Deserialize)]
struct RunRequestBody {
    command: String,
}

#[derive(Debug, Serialize)]
struct RunResponse {
    id: String,
    warnings: Vec<String>,
    /// True when `-d` was added because attached runs are not supported
    detach_forced: bool,
}

async fn run_container(
    RequireApiKey: RequireApiKey,
    Json(body): Json<RunRequestBody>,
) -> Result<Json<ApiResponse<RunResponse>>, ApiError> {
    let request = parse_run_command(&body.command)?;
    let (options, config) = request.to_container_config();

    let docker = dockhand_core::connect_docker()?;
    let created = docker
        .create_container(options, config)
        .await
        .map_err(Error::from)?;
    docker
        .start_container(&created.id, None::<StartContainerOptions<String>>)
        .await
        .map_err(Error::from)?;

    info!(container = %created.id, image = %request.image, "container started");
    Ok(Json(ApiResponse::success(RunResponse {
        id: created.id,
        warnings: created.warnings,
        detach_forced: request.detach_forced,
    })))
}

#[derive(Debug, Serialize)]
struct ActionResponse {
    id: String,
    action: &'static str,
}

fn lifecycle_ok(id: String, action: &'static str) -> Json<ApiResponse<ActionResponse>> {
    info!(container = %id, action, "lifecycle action");
    Json(ApiResponse::success(ActionResponse { id, action }))
}

async fn start_container(
    RequireApiKey: RequireApiKey,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ActionResponse>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    docker
        .start_container(&id, None::<StartContainerOptions<String>>)
        .await
        .map_err(|e| docker_err(e, || Error::ContainerNotFound(id.clone())))?;
    Ok(lifecycle_ok(id, "start"))
}

async fn stop_container(
    RequireApiKey: RequireApiKey,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ActionResponse>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    docker
        .stop_container(&id, Some(StopContainerOptions { t: 10 }))
        .await
        .map_err(|e| docker_err(e, || Error::ContainerNotFound(id.clone())))?;
    Ok(lifecycle_ok(id, "stop"))
}

async fn restart_container(
    RequireApiKey: RequireApiKey,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ActionResponse>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    docker
        .restart_container(&id, Some(RestartContainerOptions { t: 10 }))
        .await
        .map_err(|e| docker_err(e, || Error::ContainerNotFound(id.clone())))?;
    Ok(lifecycle_ok(id, "restart"))
}

async fn pause_container(
    RequireApiKey: RequireApiKey,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ActionResponse>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    docker
        .pause_container(&id)
        .await
        .map_err(|e| docker_err(e, || Error::ContainerNotFound(id.clone())))?;
    Ok(lifecycle_ok(id, "pause"))
}

async fn unpause_container(
    RequireApiKey: RequireApiKey,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ActionResponse>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    docker
        .unpause_container(&id)
        .await
        .map_err(|e| docker_err(e, || Error::ContainerNotFound(id.clone())))?;
    Ok(lifecycle_ok(id, "unpause"))
}

async fn kill_container(
    RequireApiKey: RequireApiKey,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<ActionResponse>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    docker
        .kill_container(&id, None::<KillContainerOptions<String>>)
        .await
        .map_err(|e| docker_err(e, || Error::ContainerNotFound(id.clone())))?;
    Ok(lifecycle_ok(id, "kill"))
}

#[derive(Debug, Deserialize)]
struct RemoveQuery {
    #[serde(default)]
    force: bool,
    /// Also remove anonymous volumes
    #[serde(default)]
    v: bool,
}

async fn remove_container(
    RequireApiKey: RequireApiKey,
    Path(id): Path<String>,
    Query(query): Query<RemoveQuery>,
) -> Result<Json<ApiResponse<ActionResponse>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    docker
        .remove_container(
            &id,
            Some(RemoveContainerOptions {
                force: query.force,
                v: query.v,
                ..Default::default()
            }),
        )
        .await
        .map_err(|e| docker_err(e, || Error::ContainerNotFound(id.clone())))?;

    info!(container = %id, force = query.force, "container removed");
    Ok(Json(ApiResponse::success(ActionResponse {
        id,
        action: "remove",
    })))
}

// ============================================================================
// Filesystem bridge endpoints
// ============================================================================

#[derive(Debug, Deserialize)]
struct PathQuery {
    path: String,
}

// The bridge endpoints return their payloads bare, not wrapped in the
// response envelope: file content is `{content}`, a listing is a JSON
// array, a write ack is `{status, message}`.
async fn browse_files(
    RequireApiKey: RequireApiKey,
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
) -> Result<Json<PathView>, ApiError> {
    let bridge = state.bridge()?;
    let view = bridge.browse(&id, &query.path).await?;
    Ok(Json(view))
}

#[derive(Debug, Deserialize)]
struct WriteFileBody {
    path: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct WriteAck {
    status: &'static str,
    message: String,
}

async fn write_file(
    RequireApiKey: RequireApiKey,
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<WriteFileBody>,
) -> Result<Json<WriteAck>, ApiError> {
    let bridge = state.bridge()?;
    let outcome = bridge.write(&id, &body.path, &body.content).await?;

    let via = match outcome {
        dockhand_core::WriteOutcome::HostMount => "mount",
        dockhand_core::WriteOutcome::ArchiveUpload => "archive upload",
    };
    info!(container = %id, path = %body.path, via, "file written");
    Ok(Json(WriteAck {
        status: "success",
        message: format!("File {} updated successfully (via {via})", body.path),
    }))
}

async fn download_file(
    RequireApiKey: RequireApiKey,
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<PathQuery>,
) -> Result<Response, ApiError> {
    let bridge = state.bridge()?;
    match bridge.download(&id, &query.path).await? {
        Download::HostFile {
            host_path,
            filename,
        } => {
            let file = tokio::fs::File::open(&host_path)
                .await
                .map_err(Error::from)?;
            let stream = tokio_util::io::ReaderStream::new(file);
            Ok(attachment_response(
                Body::from_stream(stream),
                &filename,
                "application/octet-stream",
            ))
        }
        Download::Archive { stream, filename } => Ok(attachment_response(
            Body::from_stream(stream),
            &filename,
            "application/x-tar",
        )),
    }
}

fn attachment_response(body: Body, filename: &str, content_type: &str) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{filename}\""),
            ),
        ],
        body,
    )
        .into_response()
}
