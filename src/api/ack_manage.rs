//! Ack management: show, enable and disable acknowledgments for a
//! comma-separated list of entities.
//!
//! Enable/disable upsert one record per object (update in place by `_key`
//! when one exists, insert otherwise) and audit every attempt. The summary
//! keeps per-object results; the overall status is 500 as soon as a single
//! enable/disable failed. Show never fails the whole request.

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::State;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::auth::RequestContext;
use super::envelope::{parse_payload, wants_describe, HandlerResponse};
use super::request::{AckManageRequest, ObjectSelection};
use super::ServiceState;
use crate::audit::{now_epoch, AuditEvent, AuditOutcome, AuditSink};
use crate::storage::acks::{load_ack_records, AckIndex};
use crate::storage::{CollectionStore, StorageError};
use crate::types::{
    ack_collection_name, component_for_category, data_collection_name, AckAction, AckRecord,
    AckState, AckType, AnomalyReason,
};

/// POST /ack_manage
pub async fn post_ack_manage(
    State(state): State<ServiceState>,
    ctx: RequestContext,
    body: Bytes,
) -> HandlerResponse {
    let Some(args) = parse_payload(&body) else {
        return describe();
    };
    if wants_describe(&args) {
        return describe();
    }

    let request = match AckManageRequest::from_args(&args) {
        Ok(request) => request,
        Err(e) => {
            error!("{}", e);
            return HandlerResponse::failure(e.to_string());
        }
    };

    state.refresh_log_level(&ctx);

    manage_acks(
        state.store.as_ref(),
        state.audit.as_ref(),
        &ctx,
        &request,
        now_epoch(),
    )
}

/// Per-object entry of an enable/disable/show summary
#[derive(Debug, Clone, Serialize)]
struct ObjectResult {
    object: String,
    action: AckAction,
    result: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    ack_record: Option<AckRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    exception: Option<String>,
}

/// Aggregated result of a request
#[derive(Debug, Default, Serialize)]
struct Summary {
    processed_count: usize,
    success_count: usize,
    failures_count: usize,
    records: Vec<Value>,
}

impl Summary {
    fn push_success(&mut self, entry: Value) {
        self.processed_count += 1;
        self.success_count += 1;
        self.records.push(entry);
    }

    fn push_failure(&mut self, entry: Value) {
        self.processed_count += 1;
        self.failures_count += 1;
        self.records.push(entry);
    }

    fn all_succeeded(&self) -> bool {
        self.processed_count > 0 && self.processed_count == self.success_count
    }
}

/// Run a validated ack-manage request against the store.
///
/// `now` is the request time in epoch seconds.
pub fn manage_acks(
    store: &dyn CollectionStore,
    audit: &dyn AuditSink,
    ctx: &RequestContext,
    request: &AckManageRequest,
    now: f64,
) -> HandlerResponse {
    let tenant_id = &request.tenant_id;
    let collection = ack_collection_name(tenant_id);

    let index = match load_ack_records(store, &collection, &request.object_category) {
        Ok(index) => index,
        Err(e) => {
            let msg = format!(
                "tenant_id=\"{tenant_id}\", failed to retrieve KVstore collection records, exception=\"{e}\""
            );
            error!("{}", msg);
            return HandlerResponse::failure(msg);
        }
    };

    let objects = match (&request.objects, request.action) {
        (ObjectSelection::All, AckAction::Show) => {
            return HandlerResponse::ok(json!({
                "processed_count": index.len(),
                "records": index.documents,
            }));
        }
        (ObjectSelection::All, _) => {
            // Rejected during validation; nothing to act on.
            return HandlerResponse::failure(format!(
                "tenant_id=\"{tenant_id}\", object_list=\"*\" is only supported with action=show"
            ));
        }
        (ObjectSelection::List(objects), _) => objects,
    };

    match request.action {
        AckAction::Show => show_objects(&index, tenant_id, objects),
        AckAction::Enable | AckAction::Disable => {
            mutate_objects(store, audit, ctx, request, &collection, &index, objects, now)
        }
    }
}

fn show_objects(index: &AckIndex, tenant_id: &str, objects: &[String]) -> HandlerResponse {
    let mut summary = Summary::default();

    for object in objects {
        match index.document(object) {
            Some(doc) => summary.push_success(Value::Object(doc.clone())),
            None => summary.push_failure(to_entry(&ObjectResult {
                object: object.clone(),
                action: AckAction::Show,
                result: "failure",
                ack_record: None,
                exception: Some(format!(
                    "tenant_id=\"{tenant_id}\", the entity=\"{object}\" could not be found in this tenant"
                )),
            })),
        }
    }

    // A missing entity only marks its own entry.
    HandlerResponse::ok(to_entry(&summary))
}

#[allow(clippy::too_many_arguments)]
fn mutate_objects(
    store: &dyn CollectionStore,
    audit: &dyn AuditSink,
    ctx: &RequestContext,
    request: &AckManageRequest,
    collection: &str,
    index: &AckIndex,
    objects: &[String],
    now: f64,
) -> HandlerResponse {
    let tenant_id = &request.tenant_id;
    let action = request.action;

    let (ack_state, ack_expiration, ack_type) = match action {
        #[allow(clippy::cast_precision_loss)]
        AckAction::Enable => (AckState::Active, now + request.ack_period as f64, request.ack_type),
        _ => (AckState::Inactive, 0.0, AckType::NotApplicable),
    };

    // Object -> key, extended as records are inserted so a repeated object
    // in the same request updates instead of duplicating.
    let mut keys: HashMap<String, String> = index
        .by_object
        .iter()
        .map(|(object, stored)| (object.clone(), stored.key.clone()))
        .collect();

    let mut summary = Summary::default();

    for object in objects {
        let mut record = AckRecord {
            object: object.clone(),
            object_category: request.object_category.clone(),
            anomaly_reason: request.anomaly_reason.clone(),
            ack_source: request.ack_source,
            ack_expiration,
            ack_state,
            ack_mtime: now,
            ack_type,
            ack_comment: request.effective_ack_comment().to_string(),
        };

        if action == AckAction::Enable && record.anomaly_reason.is_not_applicable() {
            match lookup_anomaly_reason(store, tenant_id, &request.object_category, object) {
                Ok(reason) => record.anomaly_reason = reason,
                Err(e) => error!(
                    tenant_id = %tenant_id,
                    object = %object,
                    "while attempting to retrieve the anomaly_reason an exception was encountered, exception=\"{}\"",
                    e
                ),
            }
        }

        let outcome = upsert(store, collection, &mut keys, &record);

        let (audit_outcome, audit_msg) = match &outcome {
            Ok(()) => {
                summary.push_success(to_entry(&ObjectResult {
                    object: object.clone(),
                    action,
                    result: "success",
                    ack_record: Some(record.clone()),
                    exception: None,
                }));
                let msg = match action {
                    AckAction::Enable => "The Ack was enabled successfully".to_string(),
                    _ => "The Ack was disabled successfully".to_string(),
                };
                (AuditOutcome::Success, msg)
            }
            Err(e) => {
                summary.push_failure(to_entry(&ObjectResult {
                    object: object.clone(),
                    action,
                    result: "failure",
                    ack_record: None,
                    exception: Some(format!(
                        "tenant_id=\"{tenant_id}\", the entity=\"{object}\" could not be updated, exception=\"{e}\""
                    )),
                }));
                let msg = match action {
                    AckAction::Enable => format!("The Ack could not be enabled, exception={e}"),
                    _ => format!("The Ack could not be disabled, exception={e}"),
                };
                (AuditOutcome::Failure, msg)
            }
        };

        let event = AuditEvent {
            actor_token: ctx.system_authtoken.clone(),
            endpoint: ctx.server_rest_uri.clone(),
            tenant_id: tenant_id.clone(),
            user: ctx.user.clone(),
            outcome: audit_outcome,
            action: format!("{action} ack"),
            object: object.clone(),
            object_category: request.object_category.clone(),
            record,
            message: audit_msg,
            comment: request.update_comment.clone(),
            time: now,
        };
        if let Err(e) = audit.emit(&event) {
            warn!(tenant_id = %tenant_id, object = %object, error = %e, "Failed to emit audit event");
        }
    }

    info!(
        tenant_id = %tenant_id,
        action = %action,
        processed = summary.processed_count,
        failures = summary.failures_count,
        "Ack request processed"
    );

    let status_ok = summary.all_succeeded();
    let payload = to_entry(&summary);
    if status_ok {
        HandlerResponse::ok(payload)
    } else {
        HandlerResponse::internal(payload)
    }
}

fn upsert(
    store: &dyn CollectionStore,
    collection: &str,
    keys: &mut HashMap<String, String>,
    record: &AckRecord,
) -> Result<(), StorageError> {
    let doc = serde_json::to_value(record)?;
    match keys.get(&record.object) {
        Some(key) => store.update(collection, key, &doc),
        None => {
            let key = store.insert(collection, &doc)?;
            keys.insert(record.object.clone(), key);
            Ok(())
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum LookupError {
    #[error("object_category {0:?} has no data collection")]
    UnknownCategory(String),
    #[error("no record for the entity in {0}")]
    NotFound(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Current anomaly reason of `object` in its component's data collection.
fn lookup_anomaly_reason(
    store: &dyn CollectionStore,
    tenant_id: &str,
    category: &str,
    object: &str,
) -> Result<AnomalyReason, LookupError> {
    let component = component_for_category(category)
        .ok_or_else(|| LookupError::UnknownCategory(category.to_string()))?;
    let collection = data_collection_name(component, tenant_id);

    let docs = store.query_by_field(&collection, "object", &Value::String(object.to_string()))?;
    let doc = docs
        .first()
        .ok_or_else(|| LookupError::NotFound(collection.clone()))?;

    Ok(doc
        .get("anomaly_reason")
        .map(AnomalyReason::from_value)
        .unwrap_or_default())
}

fn to_entry<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or(Value::Null)
}

fn describe() -> HandlerResponse {
    HandlerResponse::ok(json!({
        "describe": "This endpoint will enable/disable an acknowledgment for one or more entities, it requires a POST call with the following information:",
        "resource_desc": "Show/Enable/Disable/Update acknowledgement for a comma separated list of entities",
        "resource_spl_example": "| trackme url=\"/services/trackme/v2/ack/ack_manage\" mode=\"post\" body=\"{'tenant_id': 'mytenant', 'action': 'enable', 'object_category': 'splk-dsm', 'object_list': 'netscreen:netscreen:firewall', 'ack_period': 86400, 'ack_comment': 'Under review'}\"",
        "options": [{
            "tenant_id": "The tenant identifier",
            "action": "The action to be performed, valid options are: enable | disable | show.",
            "object_category": "the object category (splk-dsm, splk-dhm, splk-mhm, splk-cim, splk-flx, splk-wlk)",
            "object_list": "List of entities, in a comma separated format. If action=show and not set, will be defined to * to retrieve all Ack records, mandatory for action=enable/disable",
            "ack_period": "Required if action=enable, the period for the acknowledgment in seconds",
            "ack_type": "The type of Ack, valid options are sticky | unsticky, defaults to unsticky if not specified. Unsticky Ack are purged automatically when the entity goes back to a green state, while sticky Ack are purged only when the expiration is reached.",
            "ack_comment": "Relevant if action=enable but optional, the acknowlegment comment to be added to the records",
            "ack_source": "OPTIONAL: the source of the ack, if unset will be defined to: user_ack. Valid options are: auto_ack, user_ack",
            "anomaly_reason": "OPTIONAL: the reason for the anomaly, if unset will be defined to: N/A",
            "update_comment": "OPTIONAL: a comment for the update, comments are added to the audit record, if unset will be defined to: API update",
        }],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditError;
    use crate::storage::{Document, InMemoryStore};
    use serde_json::Map;
    use std::sync::Mutex;

    const NOW: f64 = 1_700_000_000.0;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<AuditEvent>>,
    }

    impl AuditSink for RecordingSink {
        fn emit(&self, event: &AuditEvent) -> Result<(), AuditError> {
            self.events.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    /// Fails every write, reads from an inner store.
    struct ReadOnlyStore(InMemoryStore);

    impl CollectionStore for ReadOnlyStore {
        fn query_all(&self, collection: &str) -> Result<Vec<Document>, StorageError> {
            self.0.query_all(collection)
        }
        fn query_by_field(
            &self,
            collection: &str,
            field: &str,
            value: &Value,
        ) -> Result<Vec<Document>, StorageError> {
            self.0.query_by_field(collection, field, value)
        }
        fn insert(&self, _collection: &str, _document: &Value) -> Result<String, StorageError> {
            Err(StorageError::Database("read-only".to_string()))
        }
        fn update(&self, _: &str, _: &str, _: &Value) -> Result<(), StorageError> {
            Err(StorageError::Database("read-only".to_string()))
        }
        fn backend_name(&self) -> &'static str {
            "ReadOnly"
        }
    }

    fn ctx() -> RequestContext {
        RequestContext {
            session_key: String::new(),
            system_authtoken: "sys".to_string(),
            user: "admin".to_string(),
            server_rest_uri: "/services/trackme/v2/ack/ack_manage".to_string(),
        }
    }

    fn request(v: Value) -> AckManageRequest {
        let args: Map<String, Value> = v.as_object().unwrap().clone();
        AckManageRequest::from_args(&args).unwrap()
    }

    fn run(store: &dyn CollectionStore, sink: &dyn AuditSink, v: Value) -> HandlerResponse {
        manage_acks(store, sink, &ctx(), &request(v), NOW)
    }

    #[test]
    fn test_enable_creates_records() {
        let store = InMemoryStore::new();
        let sink = RecordingSink::default();

        let resp = run(
            &store,
            &sink,
            json!({
                "tenant_id": "t1",
                "action": "enable",
                "object_category": "splk-dsm",
                "object_list": "host1,host2",
                "ack_period": 3600
            }),
        );

        assert_eq!(resp.status, 200);
        assert_eq!(resp.payload["processed_count"], 2);
        assert_eq!(resp.payload["success_count"], 2);
        assert_eq!(resp.payload["failures_count"], 0);

        let docs = store.query_all(&ack_collection_name("t1")).unwrap();
        assert_eq!(docs.len(), 2);
        for doc in &docs {
            assert_eq!(doc["ack_state"], "active");
            assert_eq!(doc["ack_type"], "unsticky");
            assert_eq!(doc["ack_expiration"], NOW + 3600.0);
            assert_eq!(doc["ack_comment"], "API update");
        }

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action, "enable ack");
        assert_eq!(events[0].outcome, AuditOutcome::Success);
        assert_eq!(events[0].message, "The Ack was enabled successfully");
        assert_eq!(events[0].actor_token, "sys");
    }

    #[test]
    fn test_disable_updates_in_place() {
        let store = InMemoryStore::new();
        let sink = RecordingSink::default();
        let base = json!({
            "tenant_id": "t1",
            "object_category": "splk-dsm",
            "object_list": "host1",
            "ack_type": "sticky"
        });

        let mut enable = base.clone();
        enable["action"] = json!("enable");
        assert!(run(&store, &sink, enable).is_ok());

        let mut disable = base;
        disable["action"] = json!("disable");
        let resp = run(&store, &sink, disable);
        assert!(resp.is_ok());

        let docs = store.query_all(&ack_collection_name("t1")).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["ack_state"], "inactive");
        assert_eq!(docs[0]["ack_expiration"], 0.0);
        assert_eq!(docs[0]["ack_type"], "N/A");
        assert_eq!(sink.events.lock().unwrap()[1].message, "The Ack was disabled successfully");
    }

    #[test]
    fn test_repeated_object_is_not_duplicated() {
        let store = InMemoryStore::new();
        let resp = run(
            &store,
            &RecordingSink::default(),
            json!({
                "tenant_id": "t1",
                "action": "enable",
                "object_category": "splk-dsm",
                "object_list": "host1,host1"
            }),
        );
        assert_eq!(resp.payload["processed_count"], 2);
        assert_eq!(store.len(&ack_collection_name("t1")), 1);
    }

    #[test]
    fn test_enable_pulls_anomaly_reason_from_data_collection() {
        let store = InMemoryStore::new();
        store
            .insert(
                &data_collection_name("dsm", "t1"),
                &json!({"object": "host1", "anomaly_reason": "lag_threshold_breached,delay_threshold_breached"}),
            )
            .unwrap();

        let resp = run(
            &store,
            &RecordingSink::default(),
            json!({
                "tenant_id": "t1",
                "action": "enable",
                "object_category": "splk-dsm",
                "object_list": "host1"
            }),
        );
        assert!(resp.is_ok());
        assert_eq!(
            resp.payload["records"][0]["ack_record"]["anomaly_reason"],
            "lag_threshold_breached,delay_threshold_breached"
        );
    }

    #[test]
    fn test_explicit_anomaly_reason_skips_lookup() {
        let store = InMemoryStore::new();
        store
            .insert(
                &data_collection_name("dsm", "t1"),
                &json!({"object": "host1", "anomaly_reason": "from_data"}),
            )
            .unwrap();

        let resp = run(
            &store,
            &RecordingSink::default(),
            json!({
                "tenant_id": "t1",
                "action": "enable",
                "object_category": "splk-dsm",
                "object_list": "host1",
                "anomaly_reason": "manual"
            }),
        );
        assert_eq!(resp.payload["records"][0]["ack_record"]["anomaly_reason"], "manual");
    }

    #[test]
    fn test_unknown_category_still_writes_with_na() {
        let store = InMemoryStore::new();
        let resp = run(
            &store,
            &RecordingSink::default(),
            json!({
                "tenant_id": "t1",
                "action": "enable",
                "object_category": "splk-unknown",
                "object_list": "thing"
            }),
        );
        assert!(resp.is_ok());

        let docs = store.query_all(&ack_collection_name("t1")).unwrap();
        assert_eq!(docs[0]["anomaly_reason"], "N/A");
    }

    #[test]
    fn test_store_failure_downgrades_status() {
        let store = ReadOnlyStore(InMemoryStore::new());
        let sink = RecordingSink::default();

        let resp = run(
            &store,
            &sink,
            json!({
                "tenant_id": "t1",
                "action": "disable",
                "object_category": "splk-dsm",
                "object_list": "host1,host2"
            }),
        );

        assert_eq!(resp.status, 500);
        assert_eq!(resp.payload["failures_count"], 2);
        assert_eq!(resp.payload["records"][0]["result"], "failure");
        assert_eq!(resp.payload["records"][0]["action"], "disable");

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].outcome, AuditOutcome::Failure);
        assert!(events[0].message.starts_with("The Ack could not be disabled"));
    }

    #[test]
    fn test_show_all_returns_every_record() {
        let store = InMemoryStore::new();
        let sink = RecordingSink::default();
        run(
            &store,
            &sink,
            json!({"tenant_id": "t1", "action": "enable", "object_category": "splk-dsm", "object_list": "a,b,c"}),
        );

        let resp = run(&store, &sink, json!({"tenant_id": "t1", "object_category": "splk-dsm"}));
        assert_eq!(resp.status, 200);
        assert_eq!(resp.payload["processed_count"], 3);
        assert_eq!(resp.payload["records"].as_array().unwrap().len(), 3);
        assert!(resp.payload["records"][0].get("_key").is_some());

        // Show does not audit.
        assert_eq!(sink.events.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_show_list_reports_missing_entities() {
        let store = InMemoryStore::new();
        let sink = RecordingSink::default();
        run(
            &store,
            &sink,
            json!({"tenant_id": "t1", "action": "enable", "object_category": "splk-dsm", "object_list": "a"}),
        );

        let resp = run(
            &store,
            &sink,
            json!({"tenant_id": "t1", "action": "show", "object_category": "splk-dsm", "object_list": "a,zzz"}),
        );
        assert_eq!(resp.status, 200);
        assert_eq!(resp.payload["success_count"], 1);
        assert_eq!(resp.payload["failures_count"], 1);
        assert_eq!(resp.payload["records"][0]["object"], "a");
        assert_eq!(resp.payload["records"][1]["result"], "failure");
        assert!(resp.payload["records"][1]["exception"]
            .as_str()
            .unwrap()
            .contains("could not be found"));
    }
}
