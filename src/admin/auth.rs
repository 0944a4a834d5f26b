use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::admin::AdminState;
use crate::error::error_response;

/// Require `Authorization: Bearer <api_key>` on every admin request.
pub async fn admin_auth_middleware(
    State(state): State<AdminState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match token {
        Some(token) if token == state.api_key.as_ref() => next.run(request).await,
        _ => {
            tracing::warn!(path = %request.uri().path(), "Rejected admin request with missing or invalid API key");
            error_response(StatusCode::UNAUTHORIZED, "Unauthorized", "Missing or invalid API key").into_response()
        }
    }
}
