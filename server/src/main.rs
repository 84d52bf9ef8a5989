mod app;
mod config;
mod draw;
mod entry;
mod error;
mod registry;
mod routes;
mod services;
mod state;
mod sync;
mod viewport;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use crate::config::MapConfig;
use crate::state::AppState;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let map_config = MapConfig::from_env();
    tracing::info!(
        working_srid = %map_config.working_srid,
        precision = map_config.precision,
        boundary_layers = map_config.boundary_layers.len(),
        "Loaded map configuration"
    );

    let state = match AppState::new(map_config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialize map session");
            return;
        }
    };

    // Spawn background services
    tokio::spawn(services::view_listener::run(state.clone()));

    let app = app::build_app(state);

    let addr = format!("0.0.0.0:{}", config::server_port());
    tracing::info!("GIS map server listening on {addr}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind TCP listener");
            return;
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server failed");
    }

    tracing::info!("Server shut down gracefully");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
