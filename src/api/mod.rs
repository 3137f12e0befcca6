//! REST API module using Axum
//!
//! Ack endpoints, nested under [`ACK_BASE_PATH`]:
//! - `GET  /`                   - resource group description
//! - `POST /ack_manage`         - show / enable / disable acks
//! - `POST /get_ack_for_object` - decorated read-only lookup
//!
//! plus a liveness probe at `/health`.

pub mod ack_manage;
pub mod auth;
pub mod envelope;
pub mod get_ack;
pub mod request;
mod routes;

pub use auth::RequestContext;
pub use envelope::HandlerResponse;
pub use routes::ACK_BASE_PATH;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::audit::AuditSink;
use crate::config::ServiceConfig;
use crate::logging::{LogLevelHandle, LogLevelLookup};
use crate::storage::CollectionStore;

/// Shared state for API handlers
#[derive(Clone)]
pub struct ServiceState {
    pub store: Arc<dyn CollectionStore>,
    pub audit: Arc<dyn AuditSink>,
    pub config: Arc<ServiceConfig>,
    /// Per-request log level source
    pub log_lookup: Option<Arc<dyn LogLevelLookup>>,
    /// Installed subscriber filter; `None` when logging was set up elsewhere
    pub log_handle: Option<LogLevelHandle>,
}

impl ServiceState {
    pub fn new(
        store: Arc<dyn CollectionStore>,
        audit: Arc<dyn AuditSink>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            store,
            audit,
            config: Arc::new(config),
            log_lookup: None,
            log_handle: None,
        }
    }

    pub fn with_log_level(
        mut self,
        lookup: Arc<dyn LogLevelLookup>,
        handle: LogLevelHandle,
    ) -> Self {
        self.log_lookup = Some(lookup);
        self.log_handle = Some(handle);
        self
    }

    /// Resolve the wanted log level with the caller's system token and
    /// apply it to the running subscriber.
    pub fn refresh_log_level(&self, ctx: &RequestContext) {
        let (Some(lookup), Some(handle)) = (&self.log_lookup, &self.log_handle) else {
            return;
        };
        if let Some(level) = lookup.log_level(&ctx.system_authtoken) {
            handle.apply(&level);
        }
    }
}

/// Create the complete application router.
pub fn create_app(state: ServiceState) -> Router {
    let server = &state.config.server;
    let body_limit = server.max_payload_size;
    let timeout = Duration::from_secs(server.request_timeout_secs);

    Router::new()
        .nest(ACK_BASE_PATH, routes::ack_routes(state))
        .merge(routes::health_routes())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(timeout))
        .layer(DefaultBodyLimit::max(body_limit))
}
