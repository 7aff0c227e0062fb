//! Bearer-token check for mutating control routes.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};

use crate::http::server::AppState;

/// Reject unauthenticated writes to `/keys`.
///
/// Reads, and everything outside `/keys`, pass through. With no API key
/// configured every request passes.
pub async fn control_auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let protected = request.uri().path().starts_with("/keys") && !request.method().is_safe();
    let Some(api_key) = state.control.api_key.as_deref().filter(|_| protected) else {
        return Ok(next.run(request).await);
    };

    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .is_some_and(|token| token == api_key);

    if authorized {
        Ok(next.run(request).await)
    } else {
        tracing::warn!(method = %request.method(), path = %request.uri().path(), "Unauthorized control request");
        Err(StatusCode::UNAUTHORIZED)
    }
}
