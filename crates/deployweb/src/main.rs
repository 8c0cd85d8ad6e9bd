//! Deployment service binary.
//!
//! Serves `POST /deploy` until Ctrl+C or SIGTERM.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use deployweb::api::{router, AppState};
use deployweb::{Orchestrator, ServiceConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("deployweb=info".parse()?))
        .init();

    info!("deployweb starting");

    let config = ServiceConfig::load().unwrap_or_else(|e| {
        info!(error = %e, "failed to load config, using defaults");
        ServiceConfig::default()
    });

    info!(
        listen_addr = %config.server.listen_addr,
        workspace_root = %config.workspace.root.display(),
        namespace = %config.deploy.namespace,
        "configuration loaded"
    );

    let orchestrator = Arc::new(Orchestrator::from_config(&config)?);
    let app = router(AppState { orchestrator })
        .layer(DefaultBodyLimit::max(config.server.body_limit_bytes));

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("shutdown signal received, initiating graceful shutdown");
        cancel_on_signal.cancel();
    });

    let listener = tokio::net::TcpListener::bind(config.server.listen_addr).await?;
    info!(address = %config.server.listen_addr, "deployweb listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
    {
        error!(error = %e, "server error");
        return Err(e.into());
    }

    info!("deployweb shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("received Ctrl+C");
        }
        () = terminate => {
            info!("received SIGTERM");
        }
    }
}
