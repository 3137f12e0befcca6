//! Session context extractor
//!
//! Resolves the caller from `Authorization: Bearer <session key>` against the
//! configured token table and pairs it with the service's system token.
//! With no tokens configured every request runs as `nobody`.

use async_trait::async_trait;
use axum::extract::{FromRequestParts, OriginalUri};
use axum::http::request::Parts;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::ServiceState;

/// User recorded when authentication is disabled.
pub const ANONYMOUS_USER: &str = "nobody";

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Per-request identity handed to the ack handlers
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub session_key: String,
    pub system_authtoken: String,
    pub user: String,
    /// Request path, recorded as the audit endpoint
    pub server_rest_uri: String,
}

/// Extract Bearer token from Authorization header.
fn extract_bearer(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.trim().to_string())
}

#[async_trait]
impl FromRequestParts<ServiceState> for RequestContext {
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServiceState,
    ) -> Result<Self, Self::Rejection> {
        let auth = &state.config.auth;
        let server_rest_uri = parts
            .extensions
            .get::<OriginalUri>()
            .map_or_else(|| parts.uri.path().to_string(), |uri| uri.path().to_string());

        if !auth.enabled() {
            return Ok(RequestContext {
                session_key: extract_bearer(parts).unwrap_or_default(),
                system_authtoken: auth.system_token.clone(),
                user: ANONYMOUS_USER.to_string(),
                server_rest_uri,
            });
        }

        let token = extract_bearer(parts).ok_or((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Missing Bearer token".to_string(),
            }),
        ))?;

        let user = auth.tokens.get(&token).cloned().ok_or_else(|| {
            tracing::warn!(uri = %server_rest_uri, "Rejected request with unknown session token");
            (
                StatusCode::FORBIDDEN,
                Json(ErrorResponse {
                    error: "Invalid session token".to_string(),
                }),
            )
        })?;

        Ok(RequestContext {
            session_key: token,
            system_authtoken: auth.system_token.clone(),
            user,
            server_rest_uri,
        })
    }
}
