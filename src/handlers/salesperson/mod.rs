mod agents;
mod keys;

pub use agents::*;
pub use keys::*;

use axum::{
    Router,
    extract::{Extension, State},
    middleware,
    routing::{get, post},
};

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::middleware::{SalespersonContext, salesperson_auth};
use crate::models::{Salesperson, SalespersonProductDetail};
use crate::salespeople;

pub async fn me(
    State(state): State<AppState>,
    Extension(ctx): Extension<SalespersonContext>,
) -> Result<Json<Salesperson>> {
    let conn = state.db.get()?;
    Ok(Json(salespeople::get(&conn, ctx.salesperson_id)?))
}

pub async fn my_products(
    State(state): State<AppState>,
    Extension(ctx): Extension<SalespersonContext>,
) -> Result<Json<Vec<SalespersonProductDetail>>> {
    let conn = state.db.get()?;
    Ok(Json(salespeople::list_products(&conn, ctx.salesperson_id)?))
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/me", get(me))
        .route("/me/products", get(my_products))
        .route("/me/keys", post(generate_keys).get(my_keys))
        .route("/me/keys/export", get(export_my_keys))
        .route("/me/sales", get(my_sales))
        .route("/me/commission", get(my_commission))
        .route("/me/agent-code", post(my_agent_code))
        .route("/me/invitations", post(create_invitation).get(my_invitations))
        .route("/me/invitations/{code}/accept", post(accept_invitation))
        .route("/me/invitations/{code}/reject", post(reject_invitation))
        .route("/me/hierarchy", get(my_hierarchy))
        .route("/me/agent-commissions", get(my_agent_commissions))
        .route_layer(middleware::from_fn_with_state(state, salesperson_auth))
}
