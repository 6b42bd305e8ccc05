//! Blog API Server
//!
//! Author: hephaex@gmail.com

use anyhow::Context;
use blog_api::{create_router, state::AppState};
use blog_core::config::LoggingConfig;
use blog_core::{AppConfig, PgStore};
use std::net::SocketAddr;
use std::sync::Arc;

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = &logging.level;
        format!("blog_api={level},blog_core={level},tower_http={level},audit=info").into()
    });

    if logging.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    // A missing JWT_SECRET stops the server here
    let config = AppConfig::load().context("Invalid configuration")?;
    init_tracing(&config.logging);

    let store = PgStore::connect(&config.database)
        .await
        .context("Connecting to the database")?;
    if config.database.run_migrations {
        store
            .run_migrations()
            .await
            .context("Running database migrations")?;
    }

    let addr = config.server.bind_addr();
    let state = Arc::new(AppState::new(config, Arc::new(store)));
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Binding {addr}"))?;
    tracing::info!("Blog API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI document at http://{}/api-docs/openapi.json", addr);

    // Peer addresses feed the audit log
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Running server")?;

    Ok(())
}
