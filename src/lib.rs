//! entity-ack: acknowledgment management for monitored entities
//!
//! An ack silences alerting on one entity of a tenant for a period of time.
//! Acks live in a per-tenant key-value collection and every state change is
//! recorded through an audit sink.
//!
//! ## Layout
//!
//! - **api**: Axum router for the ack resource group
//! - **storage**: collection store trait with sled and in-memory backends
//! - **audit**: audit event sinks
//! - **config**: TOML service configuration
//! - **logging**: subscriber setup and runtime log level changes
//! - **collector**: scheduled collector scaffold

pub mod api;
pub mod audit;
pub mod collector;
pub mod config;
pub mod logging;
pub mod storage;
pub mod types;

pub use api::{create_app, ServiceState};
pub use config::ServiceConfig;
pub use storage::{CollectionStore, InMemoryStore, SledStore, StorageError};
pub use types::{AckAction, AckRecord, StoredAck};
