//! Authentication middleware
//!
//! Validates the session token from the auth cookie or a Bearer header.

use crate::auth::decode_session_token;
use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;

/// Require a valid dashboard session on every request, unless auth is
/// disabled (no shared token configured).
pub async fn auth_middleware(
    State(state): State<SharedState>,
    jar: CookieJar,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    if state.auth.dashboard_token.is_none() {
        return Ok(next.run(request).await);
    }

    let token = jar
        .get(&state.auth.cookie_name)
        .map(|c| c.value().to_string())
        .or_else(|| {
            request
                .headers()
                .get(AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|h| h.strip_prefix("Bearer "))
                .map(|t| t.to_string())
        })
        .ok_or_else(|| {
            AppError::Unauthorized("Missing auth cookie. Visit /set-auth-cookie/ first.".to_string())
        })?;

    decode_session_token(&state.auth.jwt_secret, &token)?;

    Ok(next.run(request).await)
}
