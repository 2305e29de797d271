//! Salesperson accounts, product assignments and login.

use rusqlite::Connection;
use serde::Serialize;

use crate::auth::{TokenIssuer, hash_password, verify_password};
use crate::catalog;
use crate::clock::Clock;
use crate::db::{atomically, queries};
use crate::error::{AppError, Result};
use crate::login_limiter::LoginLimiter;
use crate::models::*;

const MIN_PASSWORD_LEN: usize = 6;

fn validate_rate(rate: f64, field: &str) -> Result<()> {
    if !rate.is_finite() || !(0.0..=1.0).contains(&rate) {
        return Err(AppError::BadRequest(format!(
            "{} must be between 0 and 1",
            field
        )));
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<()> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub fn get(conn: &Connection, id: i64) -> Result<Salesperson> {
    queries::get_salesperson(conn, id)?
        .ok_or_else(|| AppError::NotFound("Salesperson not found".into()))
}

pub fn create(conn: &Connection, clock: &dyn Clock, input: &CreateSalesperson) -> Result<Salesperson> {
    if input.username.trim().is_empty() {
        return Err(AppError::BadRequest("username is required".into()));
    }
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest("name is required".into()));
    }
    validate_password(&input.password)?;
    validate_rate(input.commission_rate, "commission_rate")?;
    validate_rate(input.parent_commission_rate, "parent_commission_rate")?;

    let password_hash = hash_password(&input.password)?;
    let salesperson =
        queries::create_salesperson(conn, input, &password_hash, clock.timestamp())?;
    tracing::info!("Created salesperson {} ({})", salesperson.id, salesperson.username);
    Ok(salesperson)
}

pub fn list(conn: &Connection, filter: &SalespersonFilter) -> Result<Page<Salesperson>> {
    queries::list_salespeople(conn, filter)
}

pub fn update(
    conn: &Connection,
    clock: &dyn Clock,
    id: i64,
    input: &UpdateSalesperson,
) -> Result<Salesperson> {
    if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(AppError::BadRequest("name must not be empty".into()));
    }
    if let Some(rate) = input.commission_rate {
        validate_rate(rate, "commission_rate")?;
    }
    if let Some(rate) = input.parent_commission_rate {
        validate_rate(rate, "parent_commission_rate")?;
    }
    let password_hash = match &input.password {
        Some(password) => {
            validate_password(password)?;
            Some(hash_password(password)?)
        }
        None => None,
    };

    get(conn, id)?;
    queries::update_salesperson(conn, id, input, password_hash, clock.timestamp())?;
    tracing::info!("Updated salesperson {}", id);
    get(conn, id)
}

/// Delete a leaf salesperson. Its assignments go with it and its parent loses
/// one child.
pub fn delete(conn: &mut Connection, id: i64) -> Result<()> {
    atomically(conn, |tx| {
        let salesperson = get(tx, id)?;
        let children = queries::count_children(tx, id)?;
        if children > 0 {
            return Err(AppError::Integrity(format!(
                "Salesperson still has {} downline agent(s)",
                children
            )));
        }
        queries::delete_salesperson(tx, id)?;
        if let Some(parent_id) = salesperson.parent_id {
            queries::adjust_children_count(tx, parent_id, -1)?;
        }
        Ok(())
    })?;
    tracing::info!("Deleted salesperson {}", id);
    Ok(())
}

// ============ Product assignments ============

/// Grant or refresh the right to mint a bound (software, key type) pair.
pub fn assign_product(
    conn: &mut Connection,
    clock: &dyn Clock,
    salesperson_id: i64,
    input: &AssignProduct,
) -> Result<SalespersonProduct> {
    if let Some(rate) = input.commission_rate {
        validate_rate(rate, "commission_rate")?;
    }
    if input.key_gen_limit.is_some_and(|l| l < 0) {
        return Err(AppError::BadRequest("key_gen_limit must be 0 or more".into()));
    }
    let now = clock.timestamp();

    let product = atomically(conn, |tx| {
        get(tx, salesperson_id)?;
        catalog::get_software(tx, input.software_id)?;
        catalog::get_key_type(tx, input.key_type_id)?;
        if queries::get_binding(tx, input.software_id, input.key_type_id)?.is_none() {
            return Err(AppError::Forbidden(
                "Key type is not bound to this software".into(),
            ));
        }

        let id = match queries::get_product(tx, salesperson_id, input.software_id, input.key_type_id)? {
            Some(existing) => {
                if let Some(limit) = input.key_gen_limit {
                    if limit > 0 && limit < existing.keys_generated {
                        return Err(AppError::BadRequest(format!(
                            "key_gen_limit is below the {} key(s) already generated",
                            existing.keys_generated
                        )));
                    }
                }
                queries::reactivate_product(tx, existing.id, input.commission_rate, input.key_gen_limit, now)?;
                existing.id
            }
            None => queries::insert_product(tx, salesperson_id, input, now)?,
        };

        queries::get_product_by_id(tx, id)?
            .ok_or_else(|| AppError::Internal("Assignment vanished after write".into()))
    })?;

    tracing::info!(
        "Assigned software {} type {} to salesperson {}",
        input.software_id,
        input.key_type_id,
        salesperson_id
    );
    Ok(product)
}

pub fn list_products(conn: &Connection, salesperson_id: i64) -> Result<Vec<SalespersonProductDetail>> {
    get(conn, salesperson_id)?;
    queries::list_products(conn, salesperson_id)
}

// ============ Login ============

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in_hours: u64,
    pub salesperson: Salesperson,
}

/// Everything login needs besides the connection.
pub struct LoginContext<'a> {
    pub clock: &'a dyn Clock,
    pub limiter: &'a LoginLimiter,
    pub tokens: &'a TokenIssuer,
}

fn rejected(limiter: &LoginLimiter, username: &str) -> AppError {
    let status = limiter.record_failure(username);
    if status.locked {
        tracing::warn!("Login locked for {} ({} min)", username, status.remaining_minutes);
        return AppError::TooManyRequests {
            minutes: status.remaining_minutes,
        };
    }
    tracing::warn!(
        "Failed login for {} ({} attempt(s) left)",
        username,
        status.remaining_attempts
    );
    AppError::Unauthorized(format!(
        "Invalid username or password, {} attempt(s) remaining",
        status.remaining_attempts
    ))
}

pub fn login(
    conn: &Connection,
    ctx: &LoginContext<'_>,
    username: &str,
    password: &str,
) -> Result<LoginResponse> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AppError::BadRequest("username and password are required".into()));
    }
    if let Some(minutes) = ctx.limiter.is_locked(username) {
        return Err(AppError::TooManyRequests { minutes });
    }

    let Some(salesperson) = queries::get_salesperson_by_username(conn, username)? else {
        return Err(rejected(ctx.limiter, username));
    };
    if !verify_password(password, &salesperson.password_hash) {
        return Err(rejected(ctx.limiter, username));
    }
    if salesperson.status != SalespersonStatus::Active {
        return Err(AppError::Forbidden(format!(
            "Account is {}",
            salesperson.status.as_ref()
        )));
    }

    ctx.limiter.reset_attempts(username);
    let token = ctx.tokens.issue(salesperson.id, &salesperson.username)?;
    let now = ctx.clock.timestamp();
    queries::touch_last_login(conn, salesperson.id, now)?;
    tracing::info!("Salesperson {} logged in", salesperson.id);

    Ok(LoginResponse {
        token,
        expires_in_hours: ctx.tokens.ttl_hours(),
        salesperson: Salesperson {
            last_login_at: Some(now),
            ..salesperson
        },
    })
}

/// Clear a salesperson's login lockout.
pub fn unlock(conn: &Connection, limiter: &LoginLimiter, id: i64) -> Result<Salesperson> {
    let salesperson = get(conn, id)?;
    limiter.reset_attempts(&salesperson.username);
    tracing::info!("Cleared login lockout for {}", salesperson.username);
    Ok(salesperson)
}
