//! Service Configuration Module
//!
//! Loaded from TOML once at startup; see [`ServiceConfig::load`] for the
//! search order. CLI flags in `main` override individual values.

mod service_config;

pub use service_config::*;
