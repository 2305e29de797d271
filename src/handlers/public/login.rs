use axum::extract::State;
use serde::Deserialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::salespeople::{self, LoginContext, LoginResponse};

#[derive(Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let conn = state.db.get()?;
    let ctx = LoginContext {
        clock: state.clock.as_ref(),
        limiter: &state.limiter,
        tokens: &state.tokens,
    };
    let response = salespeople::login(&conn, &ctx, &input.username, &input.password)?;
    Ok(Json(response))
}
