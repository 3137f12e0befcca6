//! entity-ack service entry point
//!
//! Usage:
//!   entity-ack                       # serve the ack REST endpoints
//!   entity-ack --addr 127.0.0.1:9000 # override the bind address
//!   entity-ack --config ./ack.toml   # explicit configuration file
//!   entity-ack collect               # run one collector pass and exit

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use entity_ack::api::{create_app, ServiceState};
use entity_ack::audit::{AuditSink, CollectionAuditSink, NoopAuditSink, TracingAuditSink};
use entity_ack::collector;
use entity_ack::config::{
    AuditBackend, ServiceConfig, StorageBackend, CONFIG_ENV_VAR, LOCAL_CONFIG_FILE,
};
use entity_ack::logging::{self, ConfigFileLogLevel, LogLevelLookup, StaticLogLevel};
use entity_ack::storage::{CollectionStore, InMemoryStore, SledStore};

#[derive(Parser, Debug)]
#[command(name = "entity-ack")]
#[command(about = "Acknowledgment management service for monitored entities")]
#[command(version)]
struct CliArgs {
    /// Configuration file; skips the default search order
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Server bind address (overrides [server] bind_address)
    #[arg(short, long, env = "ACK_SERVICE_ADDR")]
    addr: Option<String>,

    #[command(subcommand)]
    command: Option<SubCommand>,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Serve the REST endpoints (default)
    Serve,
    /// Run one collector pass and exit
    Collect,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let log_handle = logging::init("info");
    let args = CliArgs::parse();

    let mut config = match &args.config {
        Some(path) => ServiceConfig::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServiceConfig::load(),
    };
    if let Some(addr) = args.addr {
        config.server.bind_address = addr;
    }
    config.validate()?;

    if std::env::var("RUST_LOG").is_err() {
        log_handle.apply(&config.logging.level);
    }

    if matches!(args.command, Some(SubCommand::Collect)) {
        let streamed = collector::run_once(&config.collector);
        info!(collector = %config.collector.name, streamed, "Collector pass complete");
        return Ok(());
    }

    let store = open_store(&config)?;
    let audit = audit_sink(&config, Arc::clone(&store));
    let log_lookup = log_level_lookup(args.config.as_deref(), &config);

    info!(
        backend = store.backend_name(),
        audit = ?config.audit.backend,
        auth = config.auth.enabled(),
        "Ack service starting"
    );

    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            return;
        }
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown_token.cancel();
    });

    let collector_task = config.collector.enabled.then(|| {
        tokio::spawn(collector::run_collector(
            config.collector.clone(),
            cancel_token.clone(),
        ))
    });

    let bind_address = config.server.bind_address.clone();
    let state = ServiceState::new(store, audit, config).with_log_level(log_lookup, log_handle);
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("binding {bind_address}"))?;
    info!("Listening on http://{}", bind_address);

    let server_token = cancel_token.clone();
    let result = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            server_token.cancelled().await;
            info!("[HttpServer] Received shutdown signal");
        })
        .await;

    cancel_token.cancel();
    if let Some(task) = collector_task {
        match task.await {
            Ok(passes) => info!(passes, "[Collector] Stopped"),
            Err(e) => warn!("[Collector] Task panicked: {}", e),
        }
    }

    result.context("HTTP server error")?;
    info!("Shutdown complete");
    Ok(())
}

fn open_store(config: &ServiceConfig) -> Result<Arc<dyn CollectionStore>> {
    match config.storage.backend {
        StorageBackend::Sled => {
            let path = &config.storage.path;
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating {}", parent.display()))?;
            }
            let store = SledStore::open(path)
                .with_context(|| format!("opening sled store at {}", path.display()))?;
            info!(path = %path.display(), "Opened sled collection store");
            Ok(Arc::new(store))
        }
        StorageBackend::Memory => {
            warn!("Using in-memory collection store, acks will not survive a restart");
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

fn audit_sink(config: &ServiceConfig, store: Arc<dyn CollectionStore>) -> Arc<dyn AuditSink> {
    match config.audit.backend {
        AuditBackend::Tracing => Arc::new(TracingAuditSink),
        AuditBackend::Collection => Arc::new(CollectionAuditSink::new(store)),
        AuditBackend::None => Arc::new(NoopAuditSink),
    }
}

/// Follow the config file when there is one, so level edits apply without a restart.
fn log_level_lookup(explicit: Option<&Path>, config: &ServiceConfig) -> Arc<dyn LogLevelLookup> {
    let path = explicit.map(Path::to_path_buf).or_else(|| {
        std::env::var(CONFIG_ENV_VAR)
            .ok()
            .map(PathBuf::from)
            .filter(|p| p.exists())
            .or_else(|| Some(PathBuf::from(LOCAL_CONFIG_FILE)).filter(|p| p.exists()))
    });

    match path {
        Some(path) => Arc::new(ConfigFileLogLevel::new(path)),
        None => Arc::new(StaticLogLevel(config.logging.level.clone())),
    }
}
