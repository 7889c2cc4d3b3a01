//! famreg - registration service entry point

use famreg_core::{ProvisioningEngine, StageBasedPlanNamer};
use famreg_store::{RegistrationFilter, SqliteStore};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use famreg_server::{
    AppState, build_router, config::ServerConfig, messaging, queue::TaskQueue,
    webhook::WebhookManager,
};

#[tokio::main]
async fn main() {
    // Load configuration
    let loaded = ServerConfig::load(
        std::path::Path::new("config.yaml")
            .exists()
            .then_some("config.yaml"),
    );
    let level = loaded
        .as_ref()
        .map(|config| config.log.level.clone())
        .unwrap_or_else(|_| "info".to_string());

    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level)),
        )
        .init();

    let config = loaded.unwrap_or_else(|e| {
        tracing::warn!("Failed to load config, using defaults: {}", e);
        ServerConfig::default()
    });

    tracing::info!("Starting famreg server...");

    // Create data directory
    if let Err(e) = std::fs::create_dir_all(&config.storage.data_dir) {
        tracing::error!("Failed to create data directory: {}", e);
        std::process::exit(1);
    }

    let store = SqliteStore::open(config.registrations_db_path()).unwrap_or_else(|e| {
        tracing::error!("Failed to open registration store: {}", e);
        std::process::exit(1);
    });
    let store = Arc::new(store);

    for source in &config.sources {
        if let Err(e) = store.upsert_source(&source.to_source()) {
            tracing::error!("Failed to register source {}: {}", source.id, e);
            std::process::exit(1);
        }
    }
    tracing::info!("Sources: {}", config.sources.len());

    let catalog = messaging::load_catalog(&config.messaging).await;
    if catalog.is_empty() {
        tracing::warn!("No messagesets configured; validated registrations cannot be provisioned");
    } else {
        tracing::info!("Messagesets: {}", catalog.len());
    }
    let engine = Arc::new(ProvisioningEngine::new(StageBasedPlanNamer, catalog));

    let webhooks = Arc::new(WebhookManager::new(config.webhook.clone(), store.clone()));
    let (queue, _worker) = TaskQueue::spawn(store.clone(), engine, webhooks.clone());

    // Re-queue registrations that are not validated yet. Rejections come out
    // the same; registrations whose provisioning failed get another attempt.
    match store.list_registrations(&RegistrationFilter {
        validated: Some(false),
        ..Default::default()
    }) {
        Ok(pending) => {
            if !pending.is_empty() {
                tracing::info!("Re-queueing {} unvalidated registration(s)", pending.len());
            }
            for registration in pending {
                queue.enqueue(registration.id);
            }
        }
        Err(e) => tracing::warn!("Failed to list pending registrations: {}", e),
    }

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);

    let state = Arc::new(AppState {
        store,
        webhooks,
        config,
        queue,
    });

    // Build router
    let app = build_router(state);

    // Bind TCP listener
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("Listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Server error: {}", e);
        });

    tracing::info!("Server shut down gracefully");
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
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
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
