use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::db::AppState;
use crate::error::{AppError, Result};
use crate::util::extract_bearer_token;

/// Gate for `/admin`: the bearer token must equal the configured admin token.
pub async fn admin_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let token = extract_bearer_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".into()))?;

    if !state.admin_token.verify(token) {
        tracing::warn!("Rejected admin request with a bad token");
        return Err(AppError::Unauthorized("Invalid admin token".into()));
    }

    Ok(next.run(request).await)
}
