//! Form builder server entry point.
//!
//! Loads configuration, initializes logging, builds the shared state, and
//! serves the Axum router until SIGINT or SIGTERM. In-flight requests get a
//! bounded window to finish; requests still running after it are abandoned.

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

use formbuild_server::config::ServerConfig;
use formbuild_server::routes;
use formbuild_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load configuration from environment.
    let config = ServerConfig::from_env().context("invalid configuration")?;

    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .json()
        .init();

    info!(
        data_dir = %config.data_dir.display(),
        client_keys = config.client_keys.len(),
        template = ?config.template_path,
        "form builder starting"
    );

    let state = Arc::new(AppState::from_config(&config));
    let app = routes::build_router(state);

    // Bind and serve.
    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("failed to bind to {}:{}", config.host, config.port))?;

    info!(host = %config.host, port = config.port, "form builder listening");

    // Shutdown signal channel.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx))
        .into_future();

    tokio::select! {
        result = server => {
            result.context("server error")?;
            info!("successfully shut down server");
            Ok(())
        }
        () = shutdown_deadline(shutdown_rx, config.shutdown_timeout) => {
            error!(
                timeout_secs = config.shutdown_timeout.as_secs(),
                "graceful shutdown timed out, abandoning in-flight requests"
            );
            anyhow::bail!(
                "graceful shutdown did not complete within {}s",
                config.shutdown_timeout.as_secs()
            )
        }
    }
}

/// Resolves `timeout` after shutdown has been requested; never resolves
/// otherwise.
async fn shutdown_deadline(mut shutdown_rx: watch::Receiver<bool>, timeout: Duration) {
    if shutdown_rx.wait_for(|stopping| *stopping).await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(timeout).await;
}

/// Wait for SIGINT or SIGTERM, then broadcast shutdown.
async fn shutdown_signal(shutdown_tx: watch::Sender<bool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        if let Ok(mut sig) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        {
            sig.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("shutdown signal received, stopping server");
    let _ = shutdown_tx.send(true);
}
