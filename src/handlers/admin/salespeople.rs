use axum::extract::State;
use serde::Serialize;

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Path, Query};
use crate::handlers::Deleted;
use crate::hierarchy;
use crate::models::*;
use crate::sales;
use crate::salespeople;

pub async fn create_salesperson(
    State(state): State<AppState>,
    Json(input): Json<CreateSalesperson>,
) -> Result<Json<Salesperson>> {
    let conn = state.db.get()?;
    Ok(Json(salespeople::create(&conn, state.clock.as_ref(), &input)?))
}

pub async fn list_salespeople(
    State(state): State<AppState>,
    Query(filter): Query<SalespersonFilter>,
) -> Result<Json<Page<Salesperson>>> {
    let conn = state.db.get()?;
    Ok(Json(salespeople::list(&conn, &filter)?))
}

pub async fn get_salesperson(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Salesperson>> {
    let conn = state.db.get()?;
    Ok(Json(salespeople::get(&conn, id)?))
}

pub async fn update_salesperson(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<UpdateSalesperson>,
) -> Result<Json<Salesperson>> {
    let conn = state.db.get()?;
    Ok(Json(salespeople::update(&conn, state.clock.as_ref(), id, &input)?))
}

pub async fn delete_salesperson(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Deleted>> {
    let mut conn = state.db.get()?;
    salespeople::delete(&mut conn, id)?;
    Ok(Json(Deleted { deleted: true }))
}

pub async fn assign_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<AssignProduct>,
) -> Result<Json<SalespersonProduct>> {
    let mut conn = state.db.get()?;
    Ok(Json(salespeople::assign_product(
        &mut conn,
        state.clock.as_ref(),
        id,
        &input,
    )?))
}

pub async fn list_salesperson_products(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<SalespersonProductDetail>>> {
    let conn = state.db.get()?;
    Ok(Json(salespeople::list_products(&conn, id)?))
}

pub async fn list_salesperson_sales(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(filter): Query<SaleFilter>,
) -> Result<Json<Page<SalespersonSale>>> {
    let conn = state.db.get()?;
    Ok(Json(sales::list_sales(&conn, id, &filter)?))
}

pub async fn salesperson_commission(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CommissionStats>> {
    let conn = state.db.get()?;
    Ok(Json(sales::commission_stats(&conn, id)?))
}

#[derive(Serialize)]
pub struct AgentCodeResponse {
    pub agent_code: String,
}

pub async fn generate_salesperson_agent_code(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AgentCodeResponse>> {
    let mut conn = state.db.get()?;
    let agent_code =
        hierarchy::generate_agent_code(&mut conn, &state.codes, state.clock.as_ref(), id)?;
    Ok(Json(AgentCodeResponse { agent_code }))
}

pub async fn salesperson_hierarchy(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Hierarchy>> {
    let conn = state.db.get()?;
    Ok(Json(hierarchy::hierarchy(&conn, id)?))
}

pub async fn salesperson_agent_commissions(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<AgentCommissionList>> {
    let conn = state.db.get()?;
    Ok(Json(hierarchy::agent_commissions(&conn, id)?))
}

pub async fn unlock_salesperson(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Salesperson>> {
    let conn = state.db.get()?;
    Ok(Json(salespeople::unlock(&conn, &state.limiter, id)?))
}
