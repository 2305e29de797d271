use axum::extract::State;
use serde::Deserialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::keys;
use crate::models::{ActivateKey, Key, KeyStatusView};

pub async fn activate_key(
    State(state): State<AppState>,
    Json(input): Json<ActivateKey>,
) -> Result<Json<Key>> {
    let mut conn = state.db.get()?;
    let key = keys::activate(&mut conn, state.clock.as_ref(), &input)?;
    Ok(Json(key))
}

#[derive(Debug, Deserialize)]
pub struct KeyStatusQuery {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub key_code: Option<String>,
}

pub async fn key_status(
    State(state): State<AppState>,
    Query(query): Query<KeyStatusQuery>,
) -> Result<Json<KeyStatusView>> {
    let conn = state.db.get()?;
    let view = keys::key_status(
        &conn,
        state.clock.as_ref(),
        query.code.as_deref(),
        query.key_code.as_deref(),
    )?;
    Ok(Json(view))
}
