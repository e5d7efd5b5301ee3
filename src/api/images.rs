//! Image API endpoints

use std::collections::HashSet;

use axum::{
    extract::{Path, Query},
    routing::{delete, get, post},
    Json, Router,
};
use bollard::container::ListContainersOptions;
use bollard::image::{CreateImageOptions, ListImagesOptions, RemoveImageOptions};
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::info;

use dockhand_core::Error;

use super::error::{docker_err, ApiError};
use super::ApiResponse;
use crate::middleware::auth::RequireApiKey;

/// Create the images router
pub fn images_routes() -> Router {
    Router::new()
        .route("/api/v1/images", get(list_images))
        .route("/api/v1/images/pull", post(pull_image))
        .route("/api/v1/images/:id", get(inspect_image))
        .route("/api/v1/images/:id", delete(remove_image))
}

/// Image ids referenced by any container, running or not.
async fn used_image_ids(docker: &bollard::Docker) -> Result<HashSet<String>, Error> {
    let containers = docker
        .list_containers(Some(ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        }))
        .await?;
    Ok(containers.into_iter().filter_map(|c| c.image_id).collect())
}

fn with_in_use(value: serde_json::Value, id: Option<&str>, used: &HashSet<String>) -> serde_json::Value {
    let in_use = id.is_some_and(|id| used.contains(id));
    match value {
        serde_json::Value::Object(mut map) => {
            map.insert("in_use".to_string(), serde_json::Value::Bool(in_use));
            serde_json::Value::Object(map)
        }
        other => other,
    }
}

async fn list_images(
    RequireApiKey: RequireApiKey,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    let images = docker
        .list_images(Some(ListImagesOptions::<String> {
            all: false,
            ..Default::default()
        }))
        .await
        .map_err(Error::from)?;
    let used = used_image_ids(&docker).await?;

    Ok(Json(ApiResponse::success(
        images
            .into_iter()
            .map(|i| {
                let id = i.id.clone();
                with_in_use(
                    serde_json::to_value(i).unwrap_or_default(),
                    Some(&id),
                    &used,
                )
            })
            .collect(),
    )))
}

async fn inspect_image(
    RequireApiKey: RequireApiKey,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    let detail = docker
        .inspect_image(&id)
        .await
        .map_err(|e| docker_err(e, || Error::PathNotFound(format!("image not found: {id}"))))?;
    let used = used_image_ids(&docker).await?;

    let image_id = detail.id.clone();
    Ok(Json(ApiResponse::success(with_in_use(
        serde_json::to_value(detail).unwrap_or_default(),
        image_id.as_deref(),
        &used,
    ))))
}

#[derive(Debug, Deserialize)]
struct PullBody {
    image: String,
}

#[derive(Debug, Serialize)]
struct PullResponse {
    image: String,
    status: String,
}

async fn pull_image(
    RequireApiKey: RequireApiKey,
    Json(body): Json<PullBody>,
) -> Result<Json<ApiResponse<PullResponse>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    let mut stream = docker.create_image(
        Some(CreateImageOptions::<String> {
            from_image: body.image.clone(),
            ..Default::default()
        }),
        None,
        None,
    );

    // Drain the progress stream; the last status line summarizes the pull.
    let mut status = String::new();
    while let Some(progress) = stream.next().await {
        let progress = progress.map_err(Error::from)?;
        if let Some(s) = progress.status {
            status = s;
        }
    }

    info!(image = %body.image, "image pulled");
    Ok(Json(ApiResponse::success(PullResponse {
        image: body.image,
        status,
    })))
}

#[derive(Debug, Deserialize)]
struct RemoveImageQuery {
    #[serde(default)]
    force: bool,
}

async fn remove_image(
    RequireApiKey: RequireApiKey,
    Path(id): Path<String>,
    Query(query): Query<RemoveImageQuery>,
) -> Result<Json<ApiResponse<Vec<serde_json::Value>>>, ApiError> {
    let docker = dockhand_core::connect_docker()?;
    let deleted = docker
        .remove_image(
            &id,
            Some(RemoveImageOptions {
                force: query.force,
                ..Default::default()
            }),
            None,
        )
        .await
        .map_err(|e| docker_err(e, || Error::PathNotFound(format!("image not found: {id}"))))?;

    info!(image = %id, force = query.force, "image removed");
    Ok(Json(ApiResponse::success(
        deleted
            .into_iter()
            .map(|d| serde_json::to_value(d).unwrap_or_default())
            .collect(),
    )))
}
