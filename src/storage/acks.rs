//! Ack record loading
//!
//! Reads a tenant's ack collection once per request and indexes it by
//! object name. Documents belonging to other categories are ignored.
//! Every document of the category is kept verbatim; fields that do not
//! decode fall back to defaults in the typed view only.

use std::collections::HashMap;

use chrono::{TimeZone, Utc};
use serde_json::Value;

use super::{CollectionStore, Document, StorageError};
use crate::types::{StoredAck, NOT_APPLICABLE};

/// All ack records of one tenant+category, in store order and by object.
#[derive(Debug, Default, Clone)]
pub struct AckIndex {
    /// Raw documents, returned verbatim by `show *`
    pub documents: Vec<Document>,
    /// Parsed records keyed by object name
    pub by_object: HashMap<String, StoredAck>,
}

impl AckIndex {
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn get(&self, object: &str) -> Option<&StoredAck> {
        self.by_object.get(object)
    }

    /// Raw document for `object`, if one was loaded.
    pub fn document(&self, object: &str) -> Option<&Document> {
        self.documents
            .iter()
            .find(|doc| doc.get("object").and_then(Value::as_str) == Some(object))
    }
}

/// Load every ack record of `category` from `collection`.
pub fn load_ack_records(
    store: &dyn CollectionStore,
    collection: &str,
    category: &str,
) -> Result<AckIndex, StorageError> {
    let category_value = Value::String(category.to_string());
    let mut index = AckIndex::default();

    for doc in store.query_by_field(collection, "object_category", &category_value)? {
        match StoredAck::from_document(&doc) {
            Some(stored) => {
                index.by_object.insert(stored.record.object.clone(), stored);
            }
            None => {
                tracing::warn!(collection, "Ack record without object or _key, not indexed");
            }
        }
        index.documents.push(doc);
    }

    tracing::debug!(
        collection,
        category,
        count = index.len(),
        "Loaded ack records"
    );

    Ok(index)
}

/// Render an epoch (seconds, fractional allowed) as a UTC datetime string.
pub fn convert_epoch_to_datetime(epoch: f64) -> String {
    #[allow(clippy::cast_possible_truncation)]
    let secs = epoch.trunc() as i64;
    Utc.timestamp_opt(secs, 0)
        .single()
        .map_or_else(
            || NOT_APPLICABLE.to_string(),
            |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use serde_json::json;

    #[test]
    fn test_load_filters_by_category() {
        let store = InMemoryStore::new();
        store
            .insert("acks", &json!({"object": "h1", "object_category": "splk-dsm"}))
            .unwrap();
        store
            .insert("acks", &json!({"object": "h2", "object_category": "splk-dhm"}))
            .unwrap();

        let index = load_ack_records(&store, "acks", "splk-dsm").unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.get("h1").is_some());
        assert!(index.get("h2").is_none());
        assert_eq!(index.document("h1").unwrap()["object"], "h1");
    }

    #[test]
    fn test_load_keeps_records_with_unexpected_values() {
        let store = InMemoryStore::new();
        let bad_key = store
            .insert(
                "acks",
                &json!({"object": "bad", "object_category": "splk-dsm", "ack_state": "weird", "ack_source": ""}),
            )
            .unwrap();
        store
            .insert("acks", &json!({"object": "good", "object_category": "splk-dsm"}))
            .unwrap();

        let index = load_ack_records(&store, "acks", "splk-dsm").unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.get("good").is_some());
        assert_eq!(index.get("bad").unwrap().key, bad_key);
        assert_eq!(index.document("bad").unwrap()["ack_state"], "weird");
    }

    #[test]
    fn test_convert_epoch() {
        assert_eq!(convert_epoch_to_datetime(0.0), "1970-01-01 00:00:00 UTC");
        assert_eq!(
            convert_epoch_to_datetime(1_700_000_000.9),
            "2023-11-14 22:13:20 UTC"
        );
        assert_eq!(convert_epoch_to_datetime(f64::MAX), "N/A");
    }
}
