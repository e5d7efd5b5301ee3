//! API error mapping
//!
//! Converts core errors into HTTP responses with the standard envelope.
//! Each error kind carries its own status code so clients can distinguish
//! a missing path from a refused one without parsing messages.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dockhand_core::Error;

use super::ApiResponse;

/// Wrapper turning a core error into an HTTP response.
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidPath(_)
            | Error::InvalidCommand(_)
            | Error::NotADirectory(_)
            | Error::IsADirectory(_)
            | Error::TooLarge { .. }
            | Error::BinaryNotSupported => StatusCode::BAD_REQUEST,
            Error::ContainerNotFound(_)
            | Error::PathNotFound(_)
            | Error::ParentDirectoryMissing(_) => StatusCode::NOT_FOUND,
            Error::TraversalDetected => StatusCode::FORBIDDEN,
            Error::UploadFailed(_) | Error::Runtime(_) | Error::Io(_) | Error::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (status, Json(ApiResponse::<()>::error(self.0.to_string()))).into_response()
    }
}

/// Map a bollard error to a core error, turning daemon 404s into `not_found`.
pub fn docker_err(err: bollard::errors::Error, not_found: impl FnOnce() -> Error) -> ApiError {
    match err {
        bollard::errors::Error::DockerResponseServerError {
            status_code: 404, ..
        } => ApiError(not_found()),
        other => ApiError(Error::Runtime(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_per_error_kind() {
        assert_eq!(
            ApiError(Error::InvalidPath("x".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError(Error::ContainerNotFound("x".into())).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError(Error::TraversalDetected).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError(Error::Runtime("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ApiError(Error::TooLarge { max: 1 }).status(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn daemon_404_maps_to_not_found() {
        let err = bollard::errors::Error::DockerResponseServerError {
            status_code: 404,
            message: "no such container".into(),
        };
        let api = docker_err(err, || Error::ContainerNotFound("abc".into()));
        assert_eq!(api.status(), StatusCode::NOT_FOUND);
    }
}
