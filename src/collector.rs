//! Scheduled collector scaffold.
//!
//! The collector is registered with the scheduler but streams nothing:
//! each tick builds a [`CollectorRun`] and hands it to [`stream_events`].

use std::collections::HashMap;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::audit::now_epoch;
use crate::config::CollectorConfig;

/// Inputs of one collector pass
#[derive(Debug, Clone)]
pub struct CollectorRun {
    pub name: String,
    pub parameters: HashMap<String, String>,
    /// Scheduled time of the pass (epoch seconds)
    pub started_at: f64,
}

impl CollectorRun {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: HashMap::new(),
            started_at: now_epoch(),
        }
    }
}

/// Stream events for one pass. Emits nothing.
pub fn stream_events(run: &CollectorRun) -> usize {
    debug!(collector = %run.name, "collector pass, no events to stream");
    0
}

/// Run a single pass and return the number of events streamed.
pub fn run_once(config: &CollectorConfig) -> usize {
    let run = CollectorRun::new(&config.name);
    stream_events(&run)
}

/// Run passes on a fixed interval until `cancel` fires.
///
/// Returns the number of passes completed.
pub async fn run_collector(config: CollectorConfig, cancel: CancellationToken) -> u64 {
    let period = Duration::from_secs(config.interval_secs.max(1));
    info!(collector = %config.name, interval = ?period, "[Collector] Task starting");

    let mut interval = tokio::time::interval(period);
    let mut passes = 0u64;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(collector = %config.name, passes, "[Collector] Received shutdown signal");
                return passes;
            }
            _ = interval.tick() => {
                run_once(&config);
                passes += 1;
            }
        }
    }
}
