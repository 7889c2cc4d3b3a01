use axum::{
    Json,
    body::Body,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use famreg_core::Authority;
use serde_json::json;
use std::sync::Arc;

use crate::AppState;

/// The source a request was authenticated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSource {
    pub source_id: String,
    pub authority: Authority,
    pub admin: bool,
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": message })),
    )
        .into_response()
}

/// Extract the token from `Token <key>` or `Bearer <key>`.
pub fn parse_token(header_value: &str) -> Option<&str> {
    header_value
        .strip_prefix("Token ")
        .or_else(|| header_value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Response> {
    // Allow public endpoints without auth
    if request.uri().path() == "/health" {
        return Ok(next.run(request).await);
    }

    let Some(auth_header) = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
    else {
        return Err(unauthorized("Authentication credentials were not provided."));
    };

    let Some(token) = parse_token(auth_header) else {
        return Err(unauthorized(
            "Invalid Authorization header format. Use 'Token <key>'",
        ));
    };

    let Some(source) = state.config.source_for_token(token) else {
        tracing::warn!(path = %request.uri().path(), "Rejected unknown API token");
        return Err(unauthorized("Invalid token."));
    };

    request.extensions_mut().insert(AuthSource {
        source_id: source.id.clone(),
        authority: source.authority,
        admin: source.admin,
    });

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_token() {
        assert_eq!(parse_token("Token abc"), Some("abc"));
        assert_eq!(parse_token("Bearer abc "), Some("abc"));
        assert_eq!(parse_token("Token "), None);
        assert_eq!(parse_token("Basic dXNlcjpwYXNz"), None);
    }
}
