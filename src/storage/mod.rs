//! Key-value collection storage
//!
//! Collections are named buckets of JSON documents. Every stored document
//! carries a store-assigned `_key`. The ack endpoints only need four
//! operations, captured by [`CollectionStore`]:
//! - `query_all`: every document in a collection
//! - `query_by_field`: documents whose top-level field equals a value
//! - `insert`: store a new document, returning its generated key
//! - `update`: replace the document stored under a key
//!
//! Backends:
//! - [`SledStore`]: durable, one sled tree per collection
//! - [`InMemoryStore`]: for tests and throwaway deployments

pub mod acks;
mod memory;
mod sled_store;

pub use memory::InMemoryStore;
pub use sled_store::SledStore;

use serde_json::{Map, Value};

/// Field holding the store-assigned document key.
pub const KEY_FIELD: &str = "_key";

/// A stored JSON document
pub type Document = Map<String, Value>;

/// Errors raised by collection backends
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("document must be a JSON object")]
    NotAnObject,
    #[error("no document with key {key:?} in collection {collection:?}")]
    KeyNotFound { collection: String, key: String },
}

impl From<sled::Error> for StorageError {
    fn from(err: sled::Error) -> Self {
        StorageError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Trait for pluggable collection backends
///
/// Implementations must be thread-safe (Send + Sync) for shared access
/// across request handlers.
pub trait CollectionStore: Send + Sync {
    /// Return every document in `collection` (empty if it does not exist).
    fn query_all(&self, collection: &str) -> Result<Vec<Document>, StorageError>;

    /// Return documents whose top-level `field` equals `value`.
    fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StorageError>;

    /// Insert a new document and return its generated key.
    fn insert(&self, collection: &str, document: &Value) -> Result<String, StorageError>;

    /// Replace the document stored under `key`.
    fn update(&self, collection: &str, key: &str, document: &Value) -> Result<(), StorageError>;

    /// Backend name for logging
    fn backend_name(&self) -> &'static str;
}

/// Copy `document` into a map tagged with `key`.
pub(crate) fn with_key(document: &Value, key: &str) -> Result<Document, StorageError> {
    let mut map = document.as_object().cloned().ok_or(StorageError::NotAnObject)?;
    map.insert(KEY_FIELD.to_string(), Value::String(key.to_string()));
    Ok(map)
}

/// Generate a document key.
pub(crate) fn new_key() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
