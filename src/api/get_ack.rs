//! Read-only ack lookup with display decoration.
//!
//! Records are returned with human-readable datetimes, an `ack_is_enabled`
//! flag and `anomaly_reason` split into a list. For an explicit object list
//! a zero expiration renders as `N/A`; the return-all branch renders it as
//! the 1970 epoch instead, and callers rely on both shapes.

use axum::body::Bytes;
use axum::extract::State;
use serde_json::{json, Value};
use tracing::error;

use super::auth::RequestContext;
use super::envelope::{parse_payload, wants_describe, HandlerResponse};
use super::request::{GetAckRequest, ObjectSelection};
use super::ServiceState;
use crate::storage::acks::{convert_epoch_to_datetime, load_ack_records};
use crate::storage::{CollectionStore, Document};
use crate::types::{ack_collection_name, AnomalyReason, StoredAck, NOT_APPLICABLE};

/// POST /get_ack_for_object
pub async fn post_get_ack_for_object(
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

    let request = match GetAckRequest::from_args(&args) {
        Ok(request) => request,
        Err(e) => {
            error!("{}", e);
            return HandlerResponse::failure(e.to_string());
        }
    };

    state.refresh_log_level(&ctx);

    get_acks(state.store.as_ref(), &request)
}

/// Resolve and decorate the requested ack records.
pub fn get_acks(store: &dyn CollectionStore, request: &GetAckRequest) -> HandlerResponse {
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

    let records: Vec<Value> = match &request.objects {
        ObjectSelection::All => index
            .documents
            .iter()
            .filter_map(|doc| {
                let stored = index.get(doc.get("object")?.as_str()?)?;
                Some(decorate(doc, stored, false))
            })
            .collect(),
        ObjectSelection::List(objects) => objects
            .iter()
            .filter_map(|object| {
                let stored = index.get(object)?;
                let doc = index.document(object)?;
                Some(decorate(doc, stored, true))
            })
            .collect(),
    };

    HandlerResponse::ok(Value::Array(records))
}

/// Add display fields to a stored document.
///
/// `zero_expiration_as_na` controls whether an expiration of 0 renders as
/// `N/A` or as the epoch datetime.
fn decorate(doc: &Document, stored: &StoredAck, zero_expiration_as_na: bool) -> Value {
    let record = &stored.record;
    let mut out = doc.clone();

    out.insert(
        "ack_mtime_datetime".to_string(),
        json!(convert_epoch_to_datetime(record.ack_mtime)),
    );

    let expiration = if zero_expiration_as_na && record.ack_expiration == 0.0 {
        NOT_APPLICABLE.to_string()
    } else {
        convert_epoch_to_datetime(record.ack_expiration)
    };
    out.insert("ack_expiration_datetime".to_string(), json!(expiration));

    out.insert(
        "ack_is_enabled".to_string(),
        json!(u8::from(record.is_enabled())),
    );

    out.insert(
        "anomaly_reason".to_string(),
        normalize_anomaly_reason(doc.get("anomaly_reason")),
    );

    if doc.get("ack_source").map_or(true, Value::is_null) {
        out.insert("ack_source".to_string(), json!(record.ack_source));
    }

    Value::Object(out)
}

/// Missing or empty reasons become `N/A`; comma-joined strings become lists.
fn normalize_anomaly_reason(raw: Option<&Value>) -> Value {
    match raw {
        None | Some(Value::Null | Value::Bool(false)) => json!(NOT_APPLICABLE),
        Some(value) => AnomalyReason::from_value(value).normalized(),
    }
}

fn describe() -> HandlerResponse {
    HandlerResponse::ok(json!({
        "describe": "This endpoint retrieves the Ack record for one or more objects, it requires a POST call with the following information:",
        "resource_desc": "Get acknowledgement for a comma separated list of entities",
        "resource_spl_example": "| trackme url=\"/services/trackme/v2/ack/get_ack_for_object\" mode=\"post\" body=\"{'tenant_id': 'mytenant', 'object_category': 'splk-dsm', 'object_list': 'netscreen:netscreen:firewall'}\"",
        "options": [{
            "tenant_id": "The tenant identifier",
            "object_category": "the object category (splk-dsm, splk-dhm, splk-mhm, splk-cim, splk-flx, splk-wlk)",
            "object_list": "List of entities, in a comma separated format. Use * to retrieve all objects, defaults to * if not specified",
        }],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use serde_json::Map;

    fn seeded_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        let collection = ack_collection_name("t1");
        store
            .insert(
                &collection,
                &json!({
                    "object": "enabled-host",
                    "object_category": "splk-dsm",
                    "anomaly_reason": "lag,delay",
                    "ack_source": "auto_ack",
                    "ack_expiration": 1_700_003_600.0,
                    "ack_state": "active",
                    "ack_mtime": 1_700_000_000.0,
                    "ack_type": "sticky",
                    "ack_comment": "looking"
                }),
            )
            .unwrap();
        store
            .insert(
                &collection,
                &json!({
                    "object": "disabled-host",
                    "object_category": "splk-dsm",
                    "ack_expiration": 0,
                    "ack_state": "inactive",
                    "ack_mtime": 1_700_000_000.0,
                    "ack_type": "N/A"
                }),
            )
            .unwrap();
        store
    }

    fn request(v: Value) -> GetAckRequest {
        let args: Map<String, Value> = v.as_object().unwrap().clone();
        GetAckRequest::from_args(&args).unwrap()
    }

    fn find<'a>(records: &'a [Value], object: &str) -> &'a Value {
        records.iter().find(|r| r["object"] == object).unwrap()
    }

    #[test]
    fn test_explicit_list_renders_zero_expiration_as_na() {
        let store = seeded_store();
        let resp = get_acks(
            &store,
            &request(json!({
                "tenant_id": "t1",
                "object_category": "splk-dsm",
                "object_list": "enabled-host,disabled-host,ghost"
            })),
        );

        assert_eq!(resp.status, 200);
        let records = resp.payload.as_array().unwrap();
        assert_eq!(records.len(), 2);

        let enabled = find(records, "enabled-host");
        assert_eq!(enabled["ack_is_enabled"], 1);
        assert_eq!(enabled["anomaly_reason"], json!(["lag", "delay"]));
        assert_eq!(enabled["ack_source"], "auto_ack");
        assert_eq!(enabled["ack_expiration_datetime"], "2023-11-14 23:13:20 UTC");
        assert_eq!(enabled["ack_mtime_datetime"], "2023-11-14 22:13:20 UTC");

        let disabled = find(records, "disabled-host");
        assert_eq!(disabled["ack_is_enabled"], 0);
        assert_eq!(disabled["ack_expiration_datetime"], "N/A");
        assert_eq!(disabled["anomaly_reason"], "N/A");
        assert_eq!(disabled["ack_source"], "user_ack");
    }

    #[test]
    fn test_return_all_renders_zero_expiration_as_epoch() {
        let store = seeded_store();
        let resp = get_acks(
            &store,
            &request(json!({"tenant_id": "t1", "object_category": "splk-dsm"})),
        );

        let records = resp.payload.as_array().unwrap();
        assert_eq!(records.len(), 2);
        let disabled = find(records, "disabled-host");
        assert_eq!(disabled["ack_expiration_datetime"], "1970-01-01 00:00:00 UTC");
    }

    #[test]
    fn test_other_category_not_returned() {
        let store = seeded_store();
        let resp = get_acks(
            &store,
            &request(json!({"tenant_id": "t1", "object_category": "splk-dhm"})),
        );
        assert_eq!(resp.payload, json!([]));
    }

    #[test]
    fn test_describe_payload() {
        let resp = describe();
        assert!(resp.is_ok());
        assert!(resp.payload["describe"].as_str().unwrap().contains("Ack record"));
    }
}
