use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use famreg_core::{Authority, Source};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{ApiError, error, store_error};
use crate::AppState;
use crate::auth::AuthSource;

fn require_admin(auth: &AuthSource) -> Result<(), ApiError> {
    if auth.admin {
        Ok(())
    } else {
        Err(error(
            StatusCode::FORBIDDEN,
            "You do not have permission to perform this action.",
        ))
    }
}

/// Body of PUT /api/v1/sources/{id}
#[derive(Debug, Deserialize)]
pub struct SourceUpdate {
    pub name: String,
    pub authority: Authority,
}

/// List sources (GET /api/v1/sources/)
pub async fn list(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSource>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&auth)?;
    let sources = state.store.list_sources().map_err(store_error)?;
    Ok(Json(json!({
        "count": sources.len(),
        "results": sources,
    })))
}

/// Create source (POST /api/v1/sources/)
///
/// API tokens are issued through configuration, so a source created here can
/// be referenced but not authenticated as until it is configured.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSource>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    require_admin(&auth)?;
    let source: Source = serde_json::from_value(body)
        .map_err(|e| error(StatusCode::BAD_REQUEST, e.to_string()))?;

    if state.store.get_source(&source.id).map_err(store_error)?.is_some() {
        return Err(error(
            StatusCode::BAD_REQUEST,
            format!("Source '{}' already exists", source.id),
        ));
    }
    state.store.upsert_source(&source).map_err(store_error)?;

    tracing::info!(source_id = %source.id, authority = %source.authority, "Source created");
    Ok((StatusCode::CREATED, Json(json!(source))).into_response())
}

/// Read source (GET /api/v1/sources/{id})
pub async fn read(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSource>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&auth)?;
    match state.store.get_source(&id).map_err(store_error)? {
        Some(source) => Ok(Json(json!(source))),
        None => Err(error(StatusCode::NOT_FOUND, "Not found.")),
    }
}

/// Update source (PUT /api/v1/sources/{id})
pub async fn update(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSource>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    require_admin(&auth)?;
    let update: SourceUpdate = serde_json::from_value(body)
        .map_err(|e| error(StatusCode::BAD_REQUEST, e.to_string()))?;

    if state.store.get_source(&id).map_err(store_error)?.is_none() {
        return Err(error(StatusCode::NOT_FOUND, "Not found."));
    }
    let source = Source {
        id,
        name: update.name,
        authority: update.authority,
    };
    state.store.upsert_source(&source).map_err(store_error)?;

    tracing::info!(source_id = %source.id, authority = %source.authority, "Source updated");
    Ok(Json(json!(source)))
}
