//! Authentication extractors
//!
//! `RequireApiKey` validates the `X-API-Key` header (or `api_key` query
//! parameter, for WebSocket upgrades) against the key store. `RequireAdmin`
//! checks the `X-Admin-User` / `X-Admin-Pass` header pair against the
//! configured admin credentials and is always enforced, even when general
//! API auth is disabled.

use std::sync::Arc;

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::server::AppState;

/// JSON error response for auth failures
#[derive(Debug, Serialize)]
struct AuthErrorResponse {
    success: bool,
    error: String,
    code: String,
}

/// Auth rejection type
pub struct AuthRejection {
    status: StatusCode,
    error: String,
    code: &'static str,
}

impl AuthRejection {
    fn new(status: StatusCode, error: impl Into<String>, code: &'static str) -> Self {
        Self {
            status,
            error: error.into(),
            code,
        }
    }

    fn internal(error: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, error, "INTERNAL_ERROR")
    }
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = AuthErrorResponse {
            success: false,
            error: self.error,
            code: self.code.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

fn state(parts: &Parts) -> Result<Arc<AppState>, AuthRejection> {
    parts
        .extensions
        .get::<Arc<AppState>>()
        .cloned()
        .ok_or_else(|| AuthRejection::internal("application state not configured"))
}

// ============================================================================
// RequireApiKey Extractor
// ============================================================================

/// Axum extractor that requires a valid API key.
///
/// Extracts the key from:
/// 1. `X-API-Key: <key>` header
/// 2. `?api_key=<key>` query parameter (for WebSocket upgrades)
///
/// Passes everything through when auth is disabled in configuration.
pub struct RequireApiKey;

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for RequireApiKey
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let state = state(parts)?;

        if !state.auth.enabled {
            return Ok(RequireApiKey);
        }

        let key = extract_key(parts).ok_or_else(|| {
            AuthRejection::new(
                StatusCode::UNAUTHORIZED,
                "Authentication required. Provide an X-API-Key header.",
                "UNAUTHORIZED",
            )
        })?;

        let valid = state
            .key_store
            .verify(&key)
            .await
            .map_err(|e| AuthRejection::internal(e.to_string()))?;

        if !valid {
            return Err(AuthRejection::new(
                StatusCode::UNAUTHORIZED,
                "Invalid API key",
                "INVALID_CREDENTIALS",
            ));
        }

        Ok(RequireApiKey)
    }
}

/// Extract the API key from request headers or query params
fn extract_key(parts: &Parts) -> Option<String> {
    if let Some(header) = parts.headers.get("x-api-key") {
        if let Ok(value) = header.to_str() {
            return Some(value.trim().to_string());
        }
    }

    if let Some(query) = parts.uri.query() {
        for param in query.split('&') {
            if let Some(key) = param.strip_prefix("api_key=") {
                return Some(key.to_string());
            }
        }
    }

    None
}

// ============================================================================
// RequireAdmin Extractor
// ============================================================================

/// Axum extractor for the admin endpoints. Always enforced: checks the
/// `X-Admin-User` / `X-Admin-Pass` pair against configured credentials.
/// An empty configured admin user means the admin surface is disabled.
pub struct RequireAdmin;

#[async_trait::async_trait]
impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> std::result::Result<Self, Self::Rejection> {
        let state = state(parts)?;

        if state.auth.admin_user.is_empty() {
            return Err(AuthRejection::new(
                StatusCode::FORBIDDEN,
                "Admin endpoints are disabled (no admin credentials configured)",
                "FORBIDDEN",
            ));
        }

        let user = header_value(parts, "x-admin-user");
        let pass = header_value(parts, "x-admin-pass");

        match (user, pass) {
            (Some(user), Some(pass))
                if user == state.auth.admin_user && pass == state.auth.admin_pass =>
            {
                Ok(RequireAdmin)
            }
            _ => Err(AuthRejection::new(
                StatusCode::UNAUTHORIZED,
                "Invalid admin credentials",
                "INVALID_CREDENTIALS",
            )),
        }
    }
}

fn header_value(parts: &Parts, name: &str) -> Option<String> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
}
