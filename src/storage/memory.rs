//! In-memory collection store
//!
//! Thread-safe via `RwLock`. Not durable - data lost on restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use serde_json::Value;

use super::{new_key, with_key, CollectionStore, Document, StorageError};

type Collection = BTreeMap<String, Document>;

/// In-memory store for testing and minimal deployments
#[derive(Debug, Default)]
pub struct InMemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of documents in a collection.
    pub fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .map(|c| c.get(collection).map_or(0, BTreeMap::len))
            .unwrap_or(0)
    }
}

impl CollectionStore for InMemoryStore {
    fn query_all(&self, collection: &str) -> Result<Vec<Document>, StorageError> {
        let store = self
            .collections
            .read()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(store
            .get(collection)
            .map(|docs| docs.values().cloned().collect())
            .unwrap_or_default())
    }

    fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StorageError> {
        let store = self
            .collections
            .read()
            .map_err(|e| StorageError::Database(e.to_string()))?;

        Ok(store
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| doc.get(field) == Some(value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn insert(&self, collection: &str, document: &Value) -> Result<String, StorageError> {
        let key = new_key();
        let doc = with_key(document, &key)?;

        let mut store = self
            .collections
            .write()
            .map_err(|e| StorageError::Database(e.to_string()))?;
        store
            .entry(collection.to_string())
            .or_default()
            .insert(key.clone(), doc);

        Ok(key)
    }

    fn update(&self, collection: &str, key: &str, document: &Value) -> Result<(), StorageError> {
        let doc = with_key(document, key)?;

        let mut store = self
            .collections
            .write()
            .map_err(|e| StorageError::Database(e.to_string()))?;
        let slot = store
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(key))
            .ok_or_else(|| StorageError::KeyNotFound {
                collection: collection.to_string(),
                key: key.to_string(),
            })?;
        *slot = doc;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "InMemory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_and_query() {
        let store = InMemoryStore::new();
        let key = store.insert("c1", &json!({"object": "host1"})).unwrap();

        let docs = store.query_all("c1").unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0]["_key"], key.as_str());
        assert_eq!(docs[0]["object"], "host1");
    }

    #[test]
    fn test_missing_collection_is_empty() {
        let store = InMemoryStore::new();
        assert!(store.query_all("nope").unwrap().is_empty());
        assert!(store
            .query_by_field("nope", "object", &json!("x"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_update_in_place() {
        let store = InMemoryStore::new();
        let key = store.insert("c1", &json!({"object": "host1", "n": 1})).unwrap();
        store.update("c1", &key, &json!({"object": "host1", "n": 2})).unwrap();

        assert_eq!(store.len("c1"), 1);
        let docs = store.query_by_field("c1", "object", &json!("host1")).unwrap();
        assert_eq!(docs[0]["n"], 2);
    }

    #[test]
    fn test_update_unknown_key_fails() {
        let store = InMemoryStore::new();
        let err = store.update("c1", "missing", &json!({})).unwrap_err();
        assert!(matches!(err, StorageError::KeyNotFound { .. }));
    }

    #[test]
    fn test_rejects_non_object() {
        let store = InMemoryStore::new();
        assert!(matches!(
            store.insert("c1", &json!([1, 2])),
            Err(StorageError::NotAnObject)
        ));
    }

    #[test]
    fn test_trait_object() {
        let store: Box<dyn CollectionStore> = Box::new(InMemoryStore::new());
        assert_eq!(store.backend_name(), "InMemory");
        store.insert("c1", &json!({"a": 1})).unwrap();
        assert_eq!(store.query_all("c1").unwrap().len(), 1);
    }
}
