//! filegate -- download gateway with per-file download counters.
//!
//! SIGTERM/SIGINT stop accepting connections, let in-flight requests
//! finish, then drain the download-count queue before exiting.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use filegate::config::{Config, LoggingConfig};
use filegate::counters::store::CounterStore;
use filegate::counters::DownloadCounters;
use filegate::storage::backend::ObjectStore;

/// Command-line arguments for the filegate server.
#[derive(Parser, Debug)]
#[command(
    name = "filegate",
    version,
    about = "Download gateway with per-file download counters"
)]
struct Cli {
    /// Path to the YAML configuration file. Defaults apply when it is missing.
    #[arg(short, long, default_value = "filegate.yaml")]
    config: String,

    /// Override the bind address (host:port).
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = filegate::config::load_config(&cli.config)?;
    init_tracing(&config.logging);
    info!("Configuration loaded from {}", cli.config);

    let bind_addr = cli
        .bind
        .unwrap_or_else(|| format!("{}:{}", config.server.host, config.server.port));

    if config.observability.metrics {
        filegate::metrics::init_metrics();
        filegate::metrics::describe_metrics();
        info!("Prometheus metrics initialized");
    }

    if config.auth.token.is_none() {
        info!("No auth token configured: /upload and /reset-stats are disabled");
    }

    let storage = build_storage(&config)?;
    let counters = DownloadCounters::new(build_counter_store(&config)?);

    let (queue, worker) = filegate::queue::spawn(counters.clone(), config.counters.queue_capacity);

    let shutdown_timeout = Duration::from_secs(config.server.shutdown_timeout);
    let state = Arc::new(filegate::AppState {
        config,
        storage,
        counters,
        queue,
    });

    let app = filegate::server::app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("filegate listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Every request handler is done; apply what is still buffered.
    worker.shutdown(shutdown_timeout).await;
    info!("filegate shut down");

    Ok(())
}

/// Install the global tracing subscriber. `RUST_LOG` overrides
/// `logging.level`.
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Build the object store named by `storage.backend`.
fn build_storage(config: &Config) -> anyhow::Result<Arc<dyn ObjectStore>> {
    match config.storage.backend.as_str() {
        "memory" => {
            info!("In-memory object store initialized (contents are lost on exit)");
            Ok(Arc::new(filegate::storage::memory::MemoryObjectStore::new()))
        }
        "local" => {
            let root = &config.storage.local.root_dir;
            let store = filegate::storage::local::LocalObjectStore::new(root)?;
            info!("Local object store initialized at {}", root);
            Ok(Arc::new(store))
        }
        other => anyhow::bail!("unknown storage.backend '{other}' (expected 'local' or 'memory')"),
    }
}

/// Build the counter store named by `counters.backend`.
fn build_counter_store(config: &Config) -> anyhow::Result<Arc<dyn CounterStore>> {
    match config.counters.backend.as_str() {
        "memory" => {
            info!("In-memory counter store initialized (counts are lost on exit)");
            Ok(Arc::new(filegate::counters::memory::MemoryCounterStore::new()))
        }
        "sqlite" => {
            let path = &config.counters.sqlite.path;
            // Ensure parent directory exists for the SQLite file.
            if let Some(parent) = std::path::Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
            let store = filegate::counters::sqlite::SqliteCounterStore::new(path)?;
            info!("SQLite counter store initialized at {}", path);
            Ok(Arc::new(store))
        }
        other => anyhow::bail!("unknown counters.backend '{other}' (expected 'sqlite' or 'memory')"),
    }
}

/// Wait for SIGTERM or SIGINT (Ctrl+C), then return to trigger graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT, shutting down");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, shutting down");
        },
    }
}
