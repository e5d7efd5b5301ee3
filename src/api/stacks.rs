//! Compose stack endpoints
//!
//! Stacks are derived, not stored: containers sharing a
//! `com.docker.compose.project` label form a stack. Lifecycle actions fan
//! out to every member container.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::Path,
    routing::{get, post},
    Extension, Json, Router,
};
use bollard::container::{
    ListContainersOptions, RestartContainerOptions, StartContainerOptions, StopContainerOptions,
};
use serde::Serialize;
use tracing::info;

use dockhand_core::{summarize, ContainerSummary, Error, COMPOSE_PROJECT_LABEL};

use super::error::ApiError;
use super::ApiResponse;
use crate::middleware::auth::RequireApiKey;
use crate::server::AppState;

/// Create the stacks router
pub fn stacks_routes() -> Router {
    Router::new()
        .route("/api/v1/stacks", get(list_stacks))
        .route("/api/v1/stacks/:name/containers", get(stack_containers))
        .route("/api/v1/stacks/:name/start", post(start_stack))
        .route("/api/v1/stacks/:name/stop", post(stop_stack))
        .route("/api/v1/stacks/:name/restart", post(restart_stack))
}

#[derive(Debug, Serialize)]
struct StackInfo {
    name: String,
    containers: usize,
    running: usize,
    /// "running" when all members run, "partial" when some do, else "stopped"
    status: &'static str,
}

async fn list_stacks(
    RequireApiKey: RequireApiKey,
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<ApiResponse<Vec<StackInfo>>>, ApiError> {
    let members = stack_members(&state, None).await?;

    let mut grouped: BTreeMap<String, (usize, usize)> = BTreeMap::new();
    for summary in members {
        if summary.stack.is_empty() {
            continue;
        }
        let entry = grouped.entry(summary.stack).or_insert((0, 0));
        entry.0 += 1;
        if summary.status == "running" {
            entry.1 += 1;
        }
    }

    let stacks = grouped
        .into_iter()
        .map(|(name, (containers, running))| StackInfo {
            name,
            containers,
            running,
            status: if running == containers {
                "running"
            } else if running > 0 {
                "partial"
            } else {
                "stopped"
            },
        })
        .collect();
    Ok(Json(ApiResponse::success(stacks)))
}

async fn stack_containers(
    RequireApiKey: RequireApiKey,
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<Vec<ContainerSummary>>>, ApiError> {
    let members = stack_members(&state, Some(&name)).await?;
    if members.is_empty() {
        return Err(Error::PathNotFound(format!("stack not found: {name}")).into());
    }
    Ok(Json(ApiResponse::success(members)))
}

/// Swarm services carry this label instead of the compose one
const SWARM_NAMESPACE_LABEL: &str = "com.docker.stack.namespace";

/// Fetch summaries, optionally filtered down to one stack. A compose-label
/// miss falls back to the swarm namespace label.
async fn stack_members(
    state: &AppState,
    stack: Option<&str>,
) -> Result<Vec<ContainerSummary>, Error> {
    let docker = dockhand_core::connect_docker()?;

    let list = |filter: Option<String>| {
        let docker = docker.clone();
        async move {
            let mut options = ListContainersOptions::<String> {
                all: true,
                ..Default::default()
            };
            if let Some(filter) = filter {
                options.filters.insert("label".to_string(), vec![filter]);
            }
            docker.list_containers(Some(options)).await
        }
    };

    let Some(name) = stack else {
        let containers = list(None).await?;
        return Ok(containers
            .iter()
            .map(|c| summarize(c, state.self_id.as_deref()))
            .collect());
    };

    let mut containers = list(Some(format!("{COMPOSE_PROJECT_LABEL}={name}"))).await?;
    if containers.is_empty() {
        containers = list(Some(format!("{SWARM_NAMESPACE_LABEL}={name}"))).await?;
    }

    Ok(containers
        .iter()
        .map(|c| summarize(c, state.self_id.as_deref()))
        .collect())
}

#[derive(Debug, Serialize)]
struct StackActionResponse {
    stack: String,
    action: &'static str,
    affected: Vec<String>,
    errors: Vec<String>,
}

async fn apply_stack_action(
    state: &AppState,
    name: &str,
    action: &'static str,
) -> Result<StackActionResponse, ApiError> {
    let members = stack_members(state, Some(name)).await?;
    if members.is_empty() {
        return Err(Error::PathNotFound(format!("stack not found: {name}")).into());
    }

    let docker = dockhand_core::connect_docker()?;
    let mut affected = Vec::new();
    let mut errors = Vec::new();
    for member in members {
        let result = match action {
            "start" => {
                docker
                    .start_container(&member.id, None::<StartContainerOptions<String>>)
                    .await
            }
            "stop" => {
                docker
                    .stop_container(&member.id, Some(StopContainerOptions { t: 10 }))
                    .await
            }
            _ => {
                docker
                    .restart_container(&member.id, Some(RestartContainerOptions { t: 10 }))
                    .await
            }
        };
        // One failing member must not abort the rest of the stack.
        match result {
            Ok(()) => affected.push(member.name),
            Err(e) => errors.push(format!("{}: {e}", member.name)),
        }
    }

    info!(stack = %name, action, affected = affected.len(), "stack action");
    Ok(StackActionResponse {
        stack: name.to_string(),
        action,
        affected,
        errors,
    })
}

async fn start_stack(
    RequireApiKey: RequireApiKey,
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<StackActionResponse>>, ApiError> {
    Ok(Json(ApiResponse::success(
        apply_stack_action(&state, &name, "start").await?,
    )))
}

async fn stop_stack(
    RequireApiKey: RequireApiKey,
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<StackActionResponse>>, ApiError> {
    Ok(Json(ApiResponse::success(
        apply_stack_action(&state, &name, "stop").await?,
    )))
}

async fn restart_stack(
    RequireApiKey: RequireApiKey,
    Extension(state): Extension<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<StackActionResponse>>, ApiError> {
    Ok(Json(ApiResponse::success(
        apply_stack_action(&state, &name, "restart").await?,
    )))
}
