use axum::{
    extract::{Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::{ApiError, store_error};
use crate::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct SubscriptionRequestQuery {
    pub contact: Option<String>,
}

/// List subscription requests (GET /api/v1/subscriptionrequests/)
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SubscriptionRequestQuery>,
) -> Result<Json<Value>, ApiError> {
    let requests = state
        .store
        .list_subscription_requests(query.contact.as_deref())
        .map_err(store_error)?;

    Ok(Json(json!({
        "count": requests.len(),
        "results": requests,
    })))
}
