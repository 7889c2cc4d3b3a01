//! famreg - maternal registration service
//!
//! Accepts registrations over HTTP, validates them on a background queue and
//! enrols validated mothers on stage-based messaging.

pub mod auth;
pub mod config;
pub mod handlers;
pub mod messaging;
pub mod queue;
pub mod webhook;

use axum::{
    Router,
    http::Method,
    routing::get,
    routing::post,
};
use famreg_core::{MessagesetCatalog, ProvisioningEngine, StageBasedPlanNamer};
use famreg_store::SqliteStore;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

/// Provisioning engine used by the service
pub type Engine = ProvisioningEngine<StageBasedPlanNamer, MessagesetCatalog>;

/// Application state
pub struct AppState {
    pub store: Arc<SqliteStore>,
    pub config: config::ServerConfig,
    pub webhooks: Arc<webhook::WebhookManager>,
    pub queue: queue::TaskQueue,
}

/// Build the application router with all routes and middleware
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/registration/", post(handlers::registrations::create))
        .route("/api/v1/registrations/", get(handlers::registrations::list))
        .route("/api/v1/registrations/{id}", get(handlers::registrations::read))
        .route(
            "/api/v1/subscriptionrequests/",
            get(handlers::subscriptions::list),
        )
        .route(
            "/api/v1/hooks/",
            get(handlers::hooks::list).post(handlers::hooks::create),
        )
        .route(
            "/api/v1/hooks/{id}",
            get(handlers::hooks::read)
                .put(handlers::hooks::update)
                .delete(handlers::hooks::delete),
        )
        .route(
            "/api/v1/sources/",
            get(handlers::sources::list).post(handlers::sources::create),
        )
        .route(
            "/api/v1/sources/{id}",
            get(handlers::sources::read).put(handlers::sources::update),
        )
        // Middleware
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        .layer(RequestBodyLimitLayer::new(1024 * 1024)) // 1MB
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
