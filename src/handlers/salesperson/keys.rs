use axum::{
    extract::{Extension, State},
    response::Response,
};

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::{Json, Query};
use crate::handlers::{ExportQuery, export_response};
use crate::keys;
use crate::middleware::SalespersonContext;
use crate::models::*;
use crate::sales::{self, SaleOutcome};

pub async fn generate_keys(
    State(state): State<AppState>,
    Extension(ctx): Extension<SalespersonContext>,
    Json(input): Json<GenerateKeys>,
) -> Result<Json<SaleOutcome>> {
    let mut conn = state.db.get()?;
    let outcome = sales::generate_keys(
        &mut conn,
        &state.codes,
        state.clock.as_ref(),
        &state.rules,
        ctx.salesperson_id,
        &input,
    )?;
    Ok(Json(outcome))
}

/// Listing is always scoped to the caller's own keys.
pub async fn my_keys(
    State(state): State<AppState>,
    Extension(ctx): Extension<SalespersonContext>,
    Query(filter): Query<KeyFilter>,
) -> Result<Json<Page<Key>>> {
    let conn = state.db.get()?;
    Ok(Json(keys::list(&conn, &filter, Some(ctx.salesperson_id))?))
}

pub async fn export_my_keys(
    State(state): State<AppState>,
    Extension(ctx): Extension<SalespersonContext>,
    Query(filter): Query<KeyFilter>,
    Query(query): Query<ExportQuery>,
) -> Result<Response> {
    let conn = state.db.get()?;
    let export = keys::export(
        &conn,
        state.clock.as_ref(),
        &filter,
        Some(ctx.salesperson_id),
        query.format,
    )?;
    Ok(export_response(export))
}

pub async fn my_sales(
    State(state): State<AppState>,
    Extension(ctx): Extension<SalespersonContext>,
    Query(filter): Query<SaleFilter>,
) -> Result<Json<Page<SalespersonSale>>> {
    let conn = state.db.get()?;
    Ok(Json(sales::list_sales(&conn, ctx.salesperson_id, &filter)?))
}

pub async fn my_commission(
    State(state): State<AppState>,
    Extension(ctx): Extension<SalespersonContext>,
) -> Result<Json<CommissionStats>> {
    let conn = state.db.get()?;
    Ok(Json(sales::commission_stats(&conn, ctx.salesperson_id)?))
}
