use axum::extract::State;
use serde::Deserialize;

use crate::catalog;
use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Path, Query};
use crate::handlers::{Deleted, SetActive};
use crate::models::*;

use super::ADMIN_CREATOR_ID;

// ============ Software ============

pub async fn create_software(
    State(state): State<AppState>,
    Json(input): Json<CreateSoftware>,
) -> Result<Json<Software>> {
    let conn = state.db.get()?;
    Ok(Json(catalog::create_software(&conn, state.clock.as_ref(), &input)?))
}

pub async fn list_software(
    State(state): State<AppState>,
    Query(filter): Query<CatalogFilter>,
) -> Result<Json<Page<Software>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_software(&conn, &filter)?))
}

pub async fn get_software(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Software>> {
    let conn = state.db.get()?;
    Ok(Json(catalog::get_software(&conn, id)?))
}

pub async fn update_software(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateSoftware>,
) -> Result<Json<Software>> {
    let conn = state.db.get()?;
    Ok(Json(catalog::update_software(&conn, state.clock.as_ref(), id, &input)?))
}

pub async fn set_software_active(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<SetActive>,
) -> Result<Json<Software>> {
    let conn = state.db.get()?;
    Ok(Json(catalog::set_software_active(
        &conn,
        state.clock.as_ref(),
        id,
        input.is_active,
    )?))
}

pub async fn delete_software(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Deleted>> {
    let mut conn = state.db.get()?;
    catalog::delete_software(&mut conn, id)?;
    Ok(Json(Deleted { deleted: true }))
}

// ============ Bindings ============

#[derive(Deserialize)]
pub struct BindingPath {
    pub id: i64,
    pub key_type_id: i64,
}

#[derive(Deserialize)]
pub struct BindRequest {
    pub key_type_id: i64,
}

pub async fn list_bound_key_types(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<BoundKeyType>>> {
    let conn = state.db.get()?;
    Ok(Json(catalog::bound_key_types(&conn, id)?))
}

pub async fn bind_key_type(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<BindRequest>,
) -> Result<Json<SoftwareKeyType>> {
    let conn = state.db.get()?;
    let binding = catalog::bind(
        &conn,
        state.clock.as_ref(),
        id,
        input.key_type_id,
        ADMIN_CREATOR_ID,
    )?;
    Ok(Json(binding))
}

pub async fn set_binding_active(
    State(state): State<AppState>,
    Path(path): Path<BindingPath>,
    Json(input): Json<SetActive>,
) -> Result<Json<SoftwareKeyType>> {
    let conn = state.db.get()?;
    Ok(Json(catalog::set_binding_active(
        &conn,
        path.id,
        path.key_type_id,
        input.is_active,
    )?))
}

pub async fn unbind_key_type(
    State(state): State<AppState>,
    Path(path): Path<BindingPath>,
) -> Result<Json<Deleted>> {
    let conn = state.db.get()?;
    catalog::unbind(&conn, path.id, path.key_type_id)?;
    Ok(Json(Deleted { deleted: true }))
}

// ============ Key types ============

pub async fn create_key_type(
    State(state): State<AppState>,
    Json(input): Json<CreateKeyType>,
) -> Result<Json<KeyType>> {
    let conn = state.db.get()?;
    Ok(Json(catalog::create_key_type(&conn, state.clock.as_ref(), &input)?))
}

pub async fn list_key_types(
    State(state): State<AppState>,
    Query(filter): Query<CatalogFilter>,
) -> Result<Json<Page<KeyType>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_key_types(&conn, &filter)?))
}

pub async fn get_key_type(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<KeyType>> {
    let conn = state.db.get()?;
    Ok(Json(catalog::get_key_type(&conn, id)?))
}

pub async fn update_key_type(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateKeyType>,
) -> Result<Json<KeyType>> {
    let conn = state.db.get()?;
    Ok(Json(catalog::update_key_type(&conn, state.clock.as_ref(), id, &input)?))
}

pub async fn set_key_type_active(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<SetActive>,
) -> Result<Json<KeyType>> {
    let conn = state.db.get()?;
    Ok(Json(catalog::set_key_type_active(
        &conn,
        state.clock.as_ref(),
        id,
        input.is_active,
    )?))
}

pub async fn delete_key_type(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Deleted>> {
    let mut conn = state.db.get()?;
    catalog::delete_key_type(&mut conn, id)?;
    Ok(Json(Deleted { deleted: true }))
}
