//! Audit trail for ack state changes
//!
//! Every enable/disable of an object produces one [`AuditEvent`], whether
//! the underlying write succeeded or not. Sinks are fire-and-forget from
//! the caller's point of view: an emit error is logged by the handler and
//! never changes the request outcome.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::storage::{CollectionStore, StorageError};
use crate::types::{audit_collection_name, AckRecord};

/// Outcome recorded in an audit event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
    Success,
    Failure,
}

impl std::fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditOutcome::Success => write!(f, "success"),
            AuditOutcome::Failure => write!(f, "failure"),
        }
    }
}

/// One audited change
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Token of the actor emitting the event; never serialized
    #[serde(skip)]
    pub actor_token: String,
    pub endpoint: String,
    pub tenant_id: String,
    pub user: String,
    pub outcome: AuditOutcome,
    /// e.g. `enable ack`
    pub action: String,
    pub object: String,
    pub object_category: String,
    pub record: AckRecord,
    pub message: String,
    pub comment: String,
    /// Epoch seconds
    pub time: f64,
}

impl AuditEvent {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("audit serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Trait for audit backends
pub trait AuditSink: Send + Sync {
    fn emit(&self, event: &AuditEvent) -> Result<(), AuditError>;
}

/// Writes audit events to the log under the `audit` target.
#[derive(Debug, Clone, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn emit(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let json = event.to_json()?;
        match event.outcome {
            AuditOutcome::Success => tracing::info!(
                target: "audit",
                tenant_id = %event.tenant_id,
                user = %event.user,
                action = %event.action,
                object = %event.object,
                outcome = %event.outcome,
                event_json = %json,
                "{}",
                event.message
            ),
            AuditOutcome::Failure => tracing::warn!(
                target: "audit",
                tenant_id = %event.tenant_id,
                user = %event.user,
                action = %event.action,
                object = %event.object,
                outcome = %event.outcome,
                event_json = %json,
                "{}",
                event.message
            ),
        }
        Ok(())
    }
}

/// Persists audit events into the tenant's audit collection.
pub struct CollectionAuditSink {
    store: Arc<dyn CollectionStore>,
}

impl CollectionAuditSink {
    pub fn new(store: Arc<dyn CollectionStore>) -> Self {
        Self { store }
    }
}

impl AuditSink for CollectionAuditSink {
    fn emit(&self, event: &AuditEvent) -> Result<(), AuditError> {
        let doc = serde_json::to_value(event)?;
        self.store
            .insert(&audit_collection_name(&event.tenant_id), &doc)?;
        Ok(())
    }
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn emit(&self, _event: &AuditEvent) -> Result<(), AuditError> {
        Ok(())
    }
}

/// Current time as epoch seconds.
pub fn now_epoch() -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let micros = Utc::now().timestamp_micros() as f64;
    micros / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    fn event(outcome: AuditOutcome) -> AuditEvent {
        AuditEvent {
            actor_token: "secret".to_string(),
            endpoint: "/services/trackme/v2/ack/ack_manage".to_string(),
            tenant_id: "t1".to_string(),
            user: "admin".to_string(),
            outcome,
            action: "enable ack".to_string(),
            object: "host1".to_string(),
            object_category: "splk-dsm".to_string(),
            record: AckRecord {
                object: "host1".to_string(),
                object_category: "splk-dsm".to_string(),
                anomaly_reason: Default::default(),
                ack_source: Default::default(),
                ack_expiration: 0.0,
                ack_state: Default::default(),
                ack_mtime: 0.0,
                ack_type: Default::default(),
                ack_comment: String::new(),
            },
            message: "The Ack was enabled successfully".to_string(),
            comment: "API update".to_string(),
            time: 1.0,
        }
    }

    #[test]
    fn test_token_not_serialized() {
        let json = event(AuditOutcome::Success).to_json().unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("\"outcome\":\"success\""));
    }

    #[test]
    fn test_tracing_sink_does_not_fail() {
        let sink = TracingAuditSink;
        sink.emit(&event(AuditOutcome::Success)).unwrap();
        sink.emit(&event(AuditOutcome::Failure)).unwrap();
    }

    #[test]
    fn test_collection_sink_persists() {
        let store = Arc::new(InMemoryStore::new());
        let sink = CollectionAuditSink::new(store.clone());
        sink.emit(&event(AuditOutcome::Failure)).unwrap();

        let docs = store.query_all(&audit_collection_name("t1")).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["outcome"], "failure");
        assert_eq!(docs[0]["object"], "host1");
    }

    #[test]
    fn test_now_epoch_is_recent() {
        assert!(now_epoch() > 1_600_000_000.0);
    }
}
