use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::db::{AppState, queries};
use crate::error::{AppError, Result};
use crate::models::SalespersonStatus;
use crate::util::extract_bearer_token;

/// Identity of the salesperson behind a `/me` request.
#[derive(Debug, Clone)]
pub struct SalespersonContext {
    pub salesperson_id: i64,
    pub username: String,
}

/// Verify the session token and make sure the account is still usable.
fn authenticate(state: &AppState, request: &Request) -> Result<SalespersonContext> {
    let token = extract_bearer_token(request.headers())
        .ok_or_else(|| AppError::Unauthorized("Missing bearer token".into()))?;
    let claims = state.tokens.verify(token)?;

    let conn = state.db.get()?;
    let salesperson = queries::get_salesperson(&conn, claims.salesperson_id)?
        .ok_or_else(|| AppError::Unauthorized("Salesperson no longer exists".into()))?;
    if salesperson.status != SalespersonStatus::Active {
        return Err(AppError::Forbidden("Account is not active".into()));
    }

    Ok(SalespersonContext {
        salesperson_id: salesperson.id,
        username: salesperson.username,
    })
}

pub async fn salesperson_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response> {
    let ctx = authenticate(&state, &request)?;
    request.extensions_mut().insert(ctx);
    Ok(next.run(request).await)
}
