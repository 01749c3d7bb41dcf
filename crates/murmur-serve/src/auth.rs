//! Bearer token authentication middleware.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::state::AppState;

/// Middleware that requires a valid Bearer token when tokens are configured.
///
/// ```text
/// Authorization: Bearer <token>
/// ```
///
/// With an empty `MURMUR_API_TOKENS` every request passes through.
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if state.config.api_tokens.is_empty() {
        return Ok(next.run(request).await);
    }

    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|header| header.strip_prefix("Bearer "));

    let Some(token) = token else {
        tracing::debug!("missing or malformed authorization header");
        return Err(ApiError::Unauthorized);
    };

    if !state.config.api_tokens.contains(token.trim()) {
        tracing::debug!("invalid api token");
        return Err(ApiError::Unauthorized);
    }

    Ok(next.run(request).await)
}
