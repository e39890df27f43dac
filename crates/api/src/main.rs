//! API server entry point.

use std::sync::Arc;
use std::time::Duration;

use api::config::{Config, LogFormat};
use api::{AppState, create_app, create_default_state};
use document_store::{DocumentStore, InMemoryDocumentStore, PostgresDocumentStore};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
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
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(true))
            .init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Notifies admins about low stock once per `period`. The first tick is
/// skipped so a restart does not resend the alerts.
fn spawn_low_stock_sweep<S>(state: Arc<AppState<S>>, period: Duration)
where
    S: DocumentStore + Clone + 'static,
{
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            if let Err(e) = state.inventory.low_stock_sweep().await {
                tracing::error!(error = %e, "low stock sweep failed");
            }
        }
    });
}

async fn serve<S>(store: S, config: Config, metrics_handle: PrometheusHandle) -> Result<(), BoxError>
where
    S: DocumentStore + Clone + 'static,
{
    let state = create_default_state(store, config.commerce.clone());
    spawn_low_stock_sweep(state.clone(), config.low_stock_sweep);

    let app = create_app(state, metrics_handle);
    let addr = config.addr();
    tracing::info!(%addr, stock_policy = %config.commerce.stock_policy, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = Config::from_env();
    init_tracing(&config);

    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new().install_recorder()?;

    match config.database_url.clone() {
        Some(url) => {
            let store = PostgresDocumentStore::connect(&url).await?;
            store.run_migrations().await?;
            tracing::info!("connected to postgres document store");
            serve(store, config, metrics_handle).await
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using the in-memory document store");
            serve(InMemoryDocumentStore::new(), config, metrics_handle).await
        }
    }
}
