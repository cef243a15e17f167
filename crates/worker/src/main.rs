//! Worker entry point.

use bundle_store::{BundleStore, InMemoryBundleStore, PostgresBundleStore};
use metrics_exporter_prometheus::PrometheusBuilder;
use saga::BundleProcessManager;
use sqlx::postgres::PgPoolOptions;
use tokio::io::BufReader;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use worker::{Config, LogFormat, LoggingCommandSender, LoggingEventPublisher, WorkerError};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr; stdin carries the events.
    match config.log_format {
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init(),
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

async fn run_with<S>(store: S, config: &Config) -> worker::Result<()>
where
    S: BundleStore + 'static,
{
    let manager = BundleProcessManager::new(store, LoggingCommandSender, LoggingEventPublisher);
    let input = BufReader::new(tokio::io::stdin());

    let summary = worker::run(
        manager,
        config.retry_policy(),
        config.queue_capacity,
        input,
        shutdown_signal(),
    )
    .await?;

    if summary.dead_letters > 0 {
        tracing::warn!(
            dead_letters = summary.dead_letters,
            "poison queue not empty at shutdown"
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> worker::Result<()> {
    // 1. Load configuration
    let config = Config::from_env()?;

    // 2. Initialize tracing
    init_tracing(&config);

    // 3. Install Prometheus metrics recorder
    if let Some(addr) = config.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| WorkerError::Metrics(e.to_string()))?;
        tracing::info!(%addr, "serving Prometheus metrics");
    }

    // 4. Pick the store and run
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new().max_connections(10).connect(url).await?;
            let store = PostgresBundleStore::new(pool);
            store.run_migrations().await?;
            tracing::info!("using PostgreSQL bundle store");
            run_with(store, &config).await
        }
        None => {
            tracing::info!("using in-memory bundle store");
            run_with(InMemoryBundleStore::new(), &config).await
        }
    }
}
