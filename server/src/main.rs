//! reportgen HTTP server.
//!
//! Usage: `reportgen-server [CONFIG_PATH]`. Without an argument the config
//! path comes from `REPORTGEN_CONFIG`, then `~/.reportgen/config.json`.

use std::sync::Arc;

use reportgen::config::Config;
use reportgen::{
    init_database, init_logging, load_config, notify, resolve_config_path, PipelineConfig,
    ReportService, ReportStore, Result, ServiceConfig,
};
use reportgen_server::{router, AppState};
use secrecy::ExposeSecret;
use tokio::signal;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    let config = match load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_logging(&config.logging) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(config).await {
        error!(error = %e, "Server failed");
        std::process::exit(1);
    }
}

fn load() -> Result<Config> {
    let arg = std::env::args().nth(1);
    let path = resolve_config_path(arg.as_deref())?;
    Ok(load_config(&path)?)
}

async fn run(config: Config) -> Result<()> {
    info!("Starting reportgen server");

    let url = config.database.resolve_url()?;
    let db = init_database(url.expose_secret(), config.database.max_connections).await?;

    let store = ReportStore::from_config(&config.storage)?;
    store.ensure_bucket().await?;
    info!(
        backend = ?config.storage.backend,
        bucket = %store.bucket(),
        "Report storage ready"
    );

    let notifier = notify::from_config(&config.notifier)?;
    if config.notifier.endpoint.is_none() {
        warn!("No notifier endpoint configured, task completions will not be announced");
    }

    let service = ReportService::new(
        db,
        Arc::new(store),
        notifier,
        Arc::new(PipelineConfig::from_config(&config)),
        ServiceConfig::from_config(&config),
    );

    let app = router(AppState::new(service.clone()), config.server.max_body_bytes);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    service.shutdown().await;
    info!("Server shut down gracefully");
    Ok(())
}

/// Resolves on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl-C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
