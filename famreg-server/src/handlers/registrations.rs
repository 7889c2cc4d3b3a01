use axum::{
    Extension,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use famreg_core::{Registration, Stage};
use famreg_store::RegistrationFilter;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use std::sync::Arc;

use super::{ApiError, error, store_error};
use crate::AppState;
use crate::auth::AuthSource;
use crate::webhook::WebhookEvent;

/// Body of POST /api/v1/registration/
#[derive(Debug, Deserialize)]
pub struct NewRegistration {
    pub stage: Stage,
    pub mother_id: String,
    #[serde(default)]
    pub data: Map<String, Value>,
}

/// Create registration (POST /api/v1/registration/)
///
/// The registration is attributed to the authenticated source, announced to
/// webhook subscribers and queued for validation.
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSource>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let new: NewRegistration = serde_json::from_value(body)
        .map_err(|e| error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let registration = Registration::new(
        uuid::Uuid::new_v4().to_string(),
        new.stage,
        new.mother_id,
        auth.source_id,
        new.data,
    );
    let stored = state
        .store
        .insert_registration(&registration)
        .map_err(store_error)?;

    tracing::info!(
        registration_id = %stored.id,
        stage = %stored.stage,
        source = %stored.source,
        "Registration created"
    );

    state
        .webhooks
        .trigger(WebhookEvent::RegistrationAdded, json!(stored));
    state.queue.enqueue(stored.id.clone());

    Ok((StatusCode::CREATED, Json(json!(stored))).into_response())
}

/// Query parameters of GET /api/v1/registrations/
#[derive(Debug, Deserialize, Default)]
pub struct RegistrationQuery {
    pub stage: Option<String>,
    pub mother_id: Option<String>,
    pub validated: Option<String>,
    pub source: Option<String>,
    pub created_after: Option<String>,
    pub created_before: Option<String>,
}

fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "true" | "True" | "1" => Some(true),
        "false" | "False" | "0" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(name: &str, value: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| {
            error(
                StatusCode::BAD_REQUEST,
                format!("Invalid {} '{}': {}", name, value, e),
            )
        })
}

impl RegistrationQuery {
    pub fn to_filter(&self) -> Result<RegistrationFilter, ApiError> {
        let stage = self
            .stage
            .as_deref()
            .map(str::parse::<Stage>)
            .transpose()
            .map_err(|e| error(StatusCode::BAD_REQUEST, e))?;

        let validated = match self.validated.as_deref() {
            Some(v) => Some(parse_bool(v).ok_or_else(|| {
                error(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid validated value: '{}'", v),
                )
            })?),
            None => None,
        };

        Ok(RegistrationFilter {
            stage,
            mother_id: self.mother_id.clone(),
            validated,
            source: self.source.clone(),
            created_after: self
                .created_after
                .as_deref()
                .map(|v| parse_timestamp("created_after", v))
                .transpose()?,
            created_before: self
                .created_before
                .as_deref()
                .map(|v| parse_timestamp("created_before", v))
                .transpose()?,
        })
    }
}

/// List registrations (GET /api/v1/registrations/)
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RegistrationQuery>,
) -> Result<Json<Value>, ApiError> {
    let filter = query.to_filter()?;
    let registrations = state
        .store
        .list_registrations(&filter)
        .map_err(store_error)?;

    Ok(Json(json!({
        "count": registrations.len(),
        "results": registrations,
    })))
}

/// Read registration (GET /api/v1/registrations/{id})
pub async fn read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.store.get_registration(&id).map_err(store_error)? {
        Some(registration) => Ok(Json(json!(registration))),
        None => Err(error(StatusCode::NOT_FOUND, "Not found.")),
    }
}
