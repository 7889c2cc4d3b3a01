use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use famreg_store::Hook;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{ApiError, error, store_error};
use crate::AppState;
use crate::auth::AuthSource;
use crate::webhook::WebhookEvent;

/// Body of POST and PUT on /api/v1/hooks/
#[derive(Debug, Deserialize)]
pub struct HookBody {
    pub event: String,
    pub target: String,
}

impl HookBody {
    fn check(self) -> Result<Self, ApiError> {
        if WebhookEvent::from_name(&self.event).is_none() {
            let known: Vec<&str> = WebhookEvent::ALL.iter().map(|e| e.as_str()).collect();
            return Err(error(
                StatusCode::BAD_REQUEST,
                format!(
                    "Unknown event '{}'. Expected one of: {}",
                    self.event,
                    known.join(", ")
                ),
            ));
        }
        match reqwest::Url::parse(&self.target) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(self),
            _ => Err(error(
                StatusCode::BAD_REQUEST,
                format!("Invalid target URL: '{}'", self.target),
            )),
        }
    }
}

fn parse_body(body: Value) -> Result<HookBody, ApiError> {
    serde_json::from_value::<HookBody>(body)
        .map_err(|e| error(StatusCode::BAD_REQUEST, e.to_string()))?
        .check()
}

/// List hooks (GET /api/v1/hooks/)
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    let hooks = state.store.list_hooks(None).map_err(store_error)?;
    Ok(Json(json!({
        "count": hooks.len(),
        "results": hooks,
    })))
}

/// Create hook (POST /api/v1/hooks/)
pub async fn create(
    State(state): State<Arc<AppState>>,
    Extension(auth): Extension<AuthSource>,
    Json(body): Json<Value>,
) -> Result<Response, ApiError> {
    let body = parse_body(body)?;
    let hook = state
        .store
        .insert_hook(&Hook {
            id: None,
            event: body.event,
            target: body.target,
            source: Some(auth.source_id),
            created_at: None,
        })
        .map_err(store_error)?;

    tracing::info!(
        hook_id = hook.id.as_deref().unwrap_or(""),
        event = %hook.event,
        target = %hook.target,
        "Hook registered"
    );
    Ok((StatusCode::CREATED, Json(json!(hook))).into_response())
}

/// Read hook (GET /api/v1/hooks/{id})
pub async fn read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    match state.store.get_hook(&id).map_err(store_error)? {
        Some(hook) => Ok(Json(json!(hook))),
        None => Err(error(StatusCode::NOT_FOUND, "Not found.")),
    }
}

/// Update hook (PUT /api/v1/hooks/{id})
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    let body = parse_body(body)?;
    match state
        .store
        .update_hook(&id, &body.event, &body.target)
        .map_err(store_error)?
    {
        Some(hook) => Ok(Json(json!(hook))),
        None => Err(error(StatusCode::NOT_FOUND, "Not found.")),
    }
}

/// Delete hook (DELETE /api/v1/hooks/{id})
pub async fn delete(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    if state.store.delete_hook(&id).map_err(store_error)? {
        tracing::info!(hook_id = %id, "Hook deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(error(StatusCode::NOT_FOUND, "Not found."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_body_checks() {
        let ok = parse_body(json!({
            "event": "subscriptionrequest.added",
            "target": "https://example.com/hooks"
        }))
        .unwrap();
        assert_eq!(ok.event, "subscriptionrequest.added");

        let unknown_event = parse_body(json!({"event": "registration.deleted", "target": "http://x.org"}));
        assert_eq!(unknown_event.unwrap_err().0, StatusCode::BAD_REQUEST);

        let bad_target = parse_body(json!({"event": "registration.added", "target": "ftp://x.org"}));
        assert_eq!(bad_target.unwrap_err().0, StatusCode::BAD_REQUEST);

        let missing = parse_body(json!({"event": "registration.added"}));
        assert_eq!(missing.unwrap_err().0, StatusCode::BAD_REQUEST);
    }
}
