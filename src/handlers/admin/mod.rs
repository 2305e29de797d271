mod catalog;
mod keys;
mod salespeople;

pub use catalog::*;
pub use keys::*;
pub use salespeople::*;

use axum::{
    Router,
    extract::State,
    middleware,
    routing::{get, post, put},
};

use crate::db::AppState;
use crate::error::Result;
use crate::extractors::Json;
use crate::integrity::{self, IntegrityReport};
use crate::middleware::admin_auth;

/// Creator id recorded for admin-made rows. The admin surface has a single
/// shared identity.
pub const ADMIN_CREATOR_ID: i64 = 0;

pub async fn integrity_report(State(state): State<AppState>) -> Result<Json<IntegrityReport>> {
    let conn = state.db.get()?;
    Ok(Json(integrity::report(&conn)?))
}

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        // Software
        .route("/admin/software", post(create_software).get(list_software))
        .route(
            "/admin/software/{id}",
            get(get_software).put(update_software).delete(delete_software),
        )
        .route("/admin/software/{id}/active", put(set_software_active))
        // Bindings
        .route(
            "/admin/software/{id}/key-types",
            get(list_bound_key_types).post(bind_key_type),
        )
        .route(
            "/admin/software/{id}/key-types/{key_type_id}",
            put(set_binding_active).delete(unbind_key_type),
        )
        // Key types
        .route("/admin/key-types", post(create_key_type).get(list_key_types))
        .route(
            "/admin/key-types/{id}",
            get(get_key_type).put(update_key_type).delete(delete_key_type),
        )
        .route("/admin/key-types/{id}/active", put(set_key_type_active))
        // Keys
        .route("/admin/keys", post(mint_keys).get(list_keys))
        .route("/admin/keys/export", get(export_keys))
        .route("/admin/keys/{id}", get(get_key))
        .route("/admin/keys/{id}/void", post(void_key))
        .route("/admin/keys/{id}/blacklist", put(set_key_blacklist))
        // Salespeople
        .route(
            "/admin/salespeople",
            post(create_salesperson).get(list_salespeople),
        )
        .route(
            "/admin/salespeople/{id}",
            get(get_salesperson)
                .put(update_salesperson)
                .delete(delete_salesperson),
        )
        .route(
            "/admin/salespeople/{id}/products",
            post(assign_product).get(list_salesperson_products),
        )
        .route("/admin/salespeople/{id}/sales", get(list_salesperson_sales))
        .route("/admin/salespeople/{id}/commission", get(salesperson_commission))
        .route("/admin/salespeople/{id}/agent-code", post(generate_salesperson_agent_code))
        .route("/admin/salespeople/{id}/hierarchy", get(salesperson_hierarchy))
        .route(
            "/admin/salespeople/{id}/agent-commissions",
            get(salesperson_agent_commissions),
        )
        .route("/admin/salespeople/{id}/unlock", post(unlock_salesperson))
        // Audit
        .route("/admin/integrity", get(integrity_report))
        .route_layer(middleware::from_fn_with_state(state, admin_auth))
}
