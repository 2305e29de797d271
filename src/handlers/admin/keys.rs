use axum::{extract::State, response::Response};
use serde::Deserialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Path, Query};
use crate::handlers::{ExportQuery, export_response};
use crate::keys::{self, Creator};
use crate::models::*;

use super::ADMIN_CREATOR_ID;

pub async fn mint_keys(
    State(state): State<AppState>,
    Json(input): Json<MintKeys>,
) -> Result<Json<Vec<Key>>> {
    let mut conn = state.db.get()?;
    let minted = keys::mint(
        &mut conn,
        &state.codes,
        state.clock.as_ref(),
        &input,
        Creator::Admin(ADMIN_CREATOR_ID),
    )?;
    Ok(Json(minted))
}

pub async fn list_keys(
    State(state): State<AppState>,
    Query(filter): Query<KeyFilter>,
) -> Result<Json<Page<Key>>> {
    let conn = state.db.get()?;
    Ok(Json(keys::list(&conn, &filter, None)?))
}

pub async fn export_keys(
    State(state): State<AppState>,
    Query(filter): Query<KeyFilter>,
    Query(query): Query<ExportQuery>,
) -> Result<Response> {
    let conn = state.db.get()?;
    let export = keys::export(&conn, state.clock.as_ref(), &filter, None, query.format)?;
    Ok(export_response(export))
}

pub async fn get_key(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Key>> {
    let conn = state.db.get()?;
    Ok(Json(keys::get_key(&conn, id)?))
}

pub async fn void_key(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Json<Key>> {
    let mut conn = state.db.get()?;
    Ok(Json(keys::void(&mut conn, state.clock.as_ref(), id)?))
}

#[derive(Deserialize)]
pub struct BlacklistRequest {
    pub blacklisted: bool,
}

pub async fn set_key_blacklist(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<BlacklistRequest>,
) -> Result<Json<Key>> {
    let conn = state.db.get()?;
    Ok(Json(keys::set_blacklisted(
        &conn,
        state.clock.as_ref(),
        id,
        input.blacklisted,
    )?))
}
