//! # areaflowd — areaflow daemon
//!
//! Composition root that wires all adapters together and starts the server.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars) and initialise `tracing`
//! - Initialize the `SQLite` connection pool and run migrations
//! - Build the webhook broker, the built-in capability catalog and the
//!   per-applet log directory
//! - Construct the trigger registry and resume every applet that was
//!   running when the process last stopped
//! - Build the axum router and serve until SIGINT/SIGTERM
//! - Stop every trigger worker before exiting
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use areaflow_adapter_http_axum::state::AppState;
use areaflow_adapter_log_file::FileAppletLogs;
use areaflow_app::trigger::TriggerRegistry;
use areaflow_app::webhook_broker::WebhookBroker;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = config::Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&config.logging.filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Database
    let db = areaflow_adapter_storage_sqlite_sqlx::Config {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;

    // Scheduling core
    let logs = FileAppletLogs::new(&config.triggers.log_dir)?;
    let broker = Arc::new(WebhookBroker::new(config.triggers.delivery_timeout()));
    let catalog = areaflow_adapter_builtin::catalog(&broker, config.triggers.builtin_options())?;
    let registry = Arc::new(TriggerRegistry::new(
        db.repository(),
        catalog,
        logs,
        broker,
        config.triggers.timing(),
    ));
    let started = registry.load_runnable().await?;
    tracing::info!(started, "running applets resumed");

    // HTTP
    let app = areaflow_adapter_http_axum::router::build(AppState::new(Arc::clone(&registry)));

    let bind_addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!(addr = %bind_addr, "areaflowd listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    registry.shutdown().await;
    tracing::info!("areaflowd stopped");
    Ok(())
}

/// Wait for SIGINT (Ctrl+C) or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "unable to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "unable to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received SIGINT"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
