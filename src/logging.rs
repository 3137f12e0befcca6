//! Logging setup and per-request log level
//!
//! The subscriber is installed behind a `reload` layer so the level can be
//! changed while the service runs. Each request resolves the wanted level
//! through a [`LogLevelLookup`] (authenticated with the system token) and
//! applies it with [`LogLevelHandle::apply`], which is a no-op when the
//! level did not change.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

use crate::config::ServiceConfig;

/// Resolves the log level the service should currently run at.
pub trait LogLevelLookup: Send + Sync {
    fn log_level(&self, system_token: &str) -> Option<String>;
}

/// Always returns the level it was built with.
#[derive(Debug, Clone)]
pub struct StaticLogLevel(pub String);

impl LogLevelLookup for StaticLogLevel {
    fn log_level(&self, _system_token: &str) -> Option<String> {
        Some(self.0.clone())
    }
}

/// Re-reads `[logging] level` from the service config file on every lookup,
/// so operators can change verbosity without a restart.
#[derive(Debug, Clone)]
pub struct ConfigFileLogLevel {
    path: PathBuf,
}

impl ConfigFileLogLevel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LogLevelLookup for ConfigFileLogLevel {
    fn log_level(&self, _system_token: &str) -> Option<String> {
        match ServiceConfig::load_from_file(&self.path) {
            Ok(config) => Some(config.logging.level),
            Err(e) => {
                tracing::debug!(path = %self.path.display(), error = %e, "Log level lookup failed");
                None
            }
        }
    }
}

/// Handle onto the installed filter
#[derive(Clone)]
pub struct LogLevelHandle {
    handle: reload::Handle<EnvFilter, Registry>,
    current: Arc<Mutex<String>>,
}

impl LogLevelHandle {
    /// Swap the active filter if `level` differs from the current one.
    pub fn apply(&self, level: &str) {
        let Ok(mut current) = self.current.lock() else {
            return;
        };
        if *current == level {
            return;
        }

        match level.parse::<EnvFilter>() {
            Ok(filter) => match self.handle.reload(filter) {
                Ok(()) => {
                    tracing::info!(from = %current, to = %level, "Log level changed");
                    *current = level.to_string();
                }
                Err(e) => tracing::warn!(error = %e, "Failed to reload log filter"),
            },
            Err(e) => tracing::warn!(level, error = %e, "Ignoring invalid log level"),
        }
    }

    pub fn current(&self) -> String {
        self.current
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `default_level`.
pub fn init(default_level: &str) -> LogLevelHandle {
    let initial = std::env::var("RUST_LOG").unwrap_or_else(|_| default_level.to_string());
    let filter = EnvFilter::try_new(&initial).unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter_layer, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(false))
        .init();

    LogLevelHandle {
        handle,
        current: Arc::new(Mutex::new(initial)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_lookup() {
        let lookup = StaticLogLevel("debug".to_string());
        assert_eq!(lookup.log_level("token").as_deref(), Some("debug"));
    }

    #[test]
    fn test_config_file_lookup_follows_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ack_service.toml");
        std::fs::write(&path, "[logging]\nlevel = \"warn\"\n").unwrap();

        let lookup = ConfigFileLogLevel::new(&path);
        assert_eq!(lookup.log_level("sys").as_deref(), Some("warn"));

        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();
        assert_eq!(lookup.log_level("sys").as_deref(), Some("debug"));
    }

    #[test]
    fn test_config_file_lookup_missing_file() {
        let lookup = ConfigFileLogLevel::new("/nonexistent/ack_service.toml");
        assert!(lookup.log_level("sys").is_none());
    }
}
