//! Sled-backed collection store
//!
//! Each collection is a named sled tree. Keys are the document `_key`
//! bytes, values are the JSON-serialized document (including `_key`).

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;

use super::{new_key, with_key, CollectionStore, Document, StorageError};

/// Durable collection store
#[derive(Clone)]
pub struct SledStore {
    db: Arc<sled::Db>,
}

impl SledStore {
    /// Open or create the store at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path_ref = path.as_ref();
        let db = sled::open(path_ref)?;

        tracing::info!("Collection store opened at {:?}", path_ref);

        Ok(Self { db: Arc::new(db) })
    }

    fn tree(&self, collection: &str) -> Result<sled::Tree, StorageError> {
        Ok(self.db.open_tree(collection)?)
    }

    fn decode(value: &[u8]) -> Option<Document> {
        match serde_json::from_slice::<Document>(value) {
            Ok(doc) => Some(doc),
            Err(e) => {
                tracing::warn!("Failed to deserialize stored document: {}", e);
                None
            }
        }
    }
}

impl CollectionStore for SledStore {
    fn query_all(&self, collection: &str) -> Result<Vec<Document>, StorageError> {
        let tree = self.tree(collection)?;
        let mut docs = Vec::with_capacity(tree.len());

        for item in tree.iter() {
            let (_key, value) = item?;
            if let Some(doc) = Self::decode(&value) {
                docs.push(doc);
            }
        }

        tracing::debug!(collection, count = docs.len(), "Queried collection");
        Ok(docs)
    }

    fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StorageError> {
        Ok(self
            .query_all(collection)?
            .into_iter()
            .filter(|doc| doc.get(field) == Some(value))
            .collect())
    }

    fn insert(&self, collection: &str, document: &Value) -> Result<String, StorageError> {
        let tree = self.tree(collection)?;
        let key = new_key();
        let bytes = serde_json::to_vec(&with_key(document, &key)?)?;

        tree.insert(key.as_bytes(), bytes)?;
        tree.flush()?;

        Ok(key)
    }

    fn update(&self, collection: &str, key: &str, document: &Value) -> Result<(), StorageError> {
        let tree = self.tree(collection)?;
        if !tree.contains_key(key.as_bytes())? {
            return Err(StorageError::KeyNotFound {
                collection: collection.to_string(),
                key: key.to_string(),
            });
        }

        let bytes = serde_json::to_vec(&with_key(document, key)?)?;
        tree.insert(key.as_bytes(), bytes)?;
        tree.flush()?;

        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "Sled"
    }
}
