pub mod health;
pub mod hooks;
pub mod registrations;
pub mod sources;
pub mod subscriptions;

use axum::{Json, http::StatusCode};
use famreg_store::StoreError;
use serde_json::{Value, json};

pub type ApiError = (StatusCode, Json<Value>);

/// Error body in the `{"detail": ...}` shape clients expect
pub fn error(status: StatusCode, detail: impl Into<String>) -> ApiError {
    (status, Json(json!({ "detail": detail.into() })))
}

/// Map a store failure to an API error, logging it
pub fn store_error(err: StoreError) -> ApiError {
    match err {
        StoreError::NotFound { .. } => error(StatusCode::NOT_FOUND, "Not found."),
        other => {
            tracing::error!(error = %other, "Store operation failed");
            error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}
