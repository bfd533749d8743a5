//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting the operator routes.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use crate::web::state::AppState;

/// Middleware that validates the operator session cookie.
///
/// If valid, the request proceeds; if invalid or missing, returns 401
/// Unauthorized.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract cookie header
    let cookie_header = req
        .headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Parse session token from cookie
    let token = cookie_header
        .split(';')
        .find_map(|c| {
            let c = c.trim();
            c.strip_prefix("admin_session=")
        })
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // 3. Check the token against the authenticated set
    if !state.admin_tokens.lock().await.contains(token) {
        return Err(StatusCode::UNAUTHORIZED);
    }

    // 4. Continue to the handler
    Ok(next.run(req).await)
}
