use axum::extract::{Extension, State};

use crate::db::{AppState, queries};
use crate::error::Result;
use crate::extractors::{Json, Path};
use crate::handlers::admin::AgentCodeResponse;
use crate::hierarchy;
use crate::middleware::SalespersonContext;
use crate::models::*;

pub async fn my_agent_code(
    State(state): State<AppState>,
    Extension(ctx): Extension<SalespersonContext>,
) -> Result<Json<AgentCodeResponse>> {
    let mut conn = state.db.get()?;
    let agent_code = hierarchy::generate_agent_code(
        &mut conn,
        &state.codes,
        state.clock.as_ref(),
        ctx.salesperson_id,
    )?;
    Ok(Json(AgentCodeResponse { agent_code }))
}

pub async fn create_invitation(
    State(state): State<AppState>,
    Extension(ctx): Extension<SalespersonContext>,
    Json(input): Json<CreateInvitation>,
) -> Result<Json<AgentInvitation>> {
    let mut conn = state.db.get()?;
    let invitation = hierarchy::create_invitation(
        &mut conn,
        &state.codes,
        state.clock.as_ref(),
        &state.rules,
        ctx.salesperson_id,
        input,
    )?;
    Ok(Json(invitation))
}

pub async fn my_invitations(
    State(state): State<AppState>,
    Extension(ctx): Extension<SalespersonContext>,
) -> Result<Json<Vec<AgentInvitation>>> {
    let conn = state.db.get()?;
    Ok(Json(queries::list_invitations(&conn, ctx.salesperson_id)?))
}

pub async fn accept_invitation(
    State(state): State<AppState>,
    Extension(ctx): Extension<SalespersonContext>,
    Path(code): Path<String>,
) -> Result<Json<AgentInvitation>> {
    let mut conn = state.db.get()?;
    let invitation = hierarchy::accept_invitation(
        &mut conn,
        state.clock.as_ref(),
        &state.rules,
        &code,
        ctx.salesperson_id,
    )?;
    Ok(Json(invitation))
}

pub async fn reject_invitation(
    State(state): State<AppState>,
    Extension(ctx): Extension<SalespersonContext>,
    Path(code): Path<String>,
) -> Result<Json<AgentInvitation>> {
    let conn = state.db.get()?;
    let invitation =
        hierarchy::reject_invitation(&conn, state.clock.as_ref(), &code, ctx.salesperson_id)?;
    Ok(Json(invitation))
}

pub async fn my_hierarchy(
    State(state): State<AppState>,
    Extension(ctx): Extension<SalespersonContext>,
) -> Result<Json<Hierarchy>> {
    let conn = state.db.get()?;
    Ok(Json(hierarchy::hierarchy(&conn, ctx.salesperson_id)?))
}

pub async fn my_agent_commissions(
    State(state): State<AppState>,
    Extension(ctx): Extension<SalespersonContext>,
) -> Result<Json<AgentCommissionList>> {
    let conn = state.db.get()?;
    Ok(Json(hierarchy::agent_commissions(&conn, ctx.salesperson_id)?))
}
