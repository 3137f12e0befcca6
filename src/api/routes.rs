//! API route definitions

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use super::ack_manage::post_ack_manage;
use super::envelope::HandlerResponse;
use super::get_ack::post_get_ack_for_object;
use super::ServiceState;

/// Mount point of the ack resource group
pub const ACK_BASE_PATH: &str = "/services/trackme/v2/ack";

/// Ack resource group routes
pub fn ack_routes(state: ServiceState) -> Router {
    Router::new()
        .route("/", get(get_resource_group_desc_ack))
        .route("/ack_manage", post(post_ack_manage))
        .route("/get_ack_for_object", post(post_get_ack_for_object))
        .with_state(state)
}

/// Liveness endpoint at root level
pub fn health_routes() -> Router {
    Router::new().route("/health", get(health_check))
}

/// GET / - describe the ack resource group
async fn get_resource_group_desc_ack() -> HandlerResponse {
    HandlerResponse::ok(json!({
        "resource_group_name": "ack",
        "resource_group_desc": "Acknowledgments allow silencing an entity alert for a given period of time automatically",
    }))
}

async fn health_check() -> Json<Value> {
    Json(json!({"status": "ok"}))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::NoopAuditSink;
    use crate::config::ServiceConfig;
    use crate::storage::InMemoryStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn create_test_state() -> ServiceState {
        ServiceState::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(NoopAuditSink),
            ServiceConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_resource_group_desc() {
        let app = ack_routes(create_test_state());

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let v: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(v["resource_group_name"], "ack");
    }

    #[tokio::test]
    async fn test_health() {
        let response = health_routes()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }
}
