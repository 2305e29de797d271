//! Software, key types and the binding set that gates minting.

use rusqlite::Connection;

use crate::clock::Clock;
use crate::db::{atomically, queries};
use crate::error::{AppError, Result};
use crate::models::*;

fn require_name(name: &str, what: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest(format!("{} name is required", what)));
    }
    Ok(())
}

/// Longest validity a key type may grant: 100 years.
pub const MAX_KEY_TYPE_HOURS: i64 = 100 * 365 * 24;

fn validate_terms(hours: Option<i64>, price: Option<f64>) -> Result<()> {
    if hours.is_some_and(|h| h <= 0 || h > MAX_KEY_TYPE_HOURS) {
        return Err(AppError::BadRequest(format!(
            "hours must be between 1 and {}",
            MAX_KEY_TYPE_HOURS
        )));
    }
    if price.is_some_and(|p| !p.is_finite() || p < 0.0) {
        return Err(AppError::BadRequest("price must be 0 or more".into()));
    }
    Ok(())
}

pub fn get_software(conn: &Connection, id: i64) -> Result<Software> {
    queries::get_software(conn, id)?
        .ok_or_else(|| AppError::NotFound("Software not found".into()))
}

pub fn get_key_type(conn: &Connection, id: i64) -> Result<KeyType> {
    queries::get_key_type(conn, id)?
        .ok_or_else(|| AppError::NotFound("Key type not found".into()))
}

// ============ Software ============

pub fn create_software(conn: &Connection, clock: &dyn Clock, input: &CreateSoftware) -> Result<Software> {
    require_name(&input.name, "Software")?;
    if input.version.trim().is_empty() {
        return Err(AppError::BadRequest("version is required".into()));
    }
    let software = queries::create_software(conn, input, clock.timestamp())?;
    tracing::info!("Created software {} ({})", software.id, software.name);
    Ok(software)
}

pub fn update_software(
    conn: &Connection,
    clock: &dyn Clock,
    id: i64,
    input: &UpdateSoftware,
) -> Result<Software> {
    if let Some(name) = &input.name {
        require_name(name, "Software")?;
    }
    get_software(conn, id)?;
    queries::update_software(conn, id, input, clock.timestamp())?;
    get_software(conn, id)
}

pub fn set_software_active(conn: &Connection, clock: &dyn Clock, id: i64, active: bool) -> Result<Software> {
    if !queries::set_software_active(conn, id, active, clock.timestamp())? {
        return Err(AppError::NotFound("Software not found".into()));
    }
    tracing::info!("Software {} active={}", id, active);
    get_software(conn, id)
}

/// Delete a software and its bindings. Refused while any key references it.
pub fn delete_software(conn: &mut Connection, id: i64) -> Result<()> {
    atomically(conn, |tx| {
        get_software(tx, id)?;
        let keys = queries::count_keys_for_software(tx, id)?;
        if keys > 0 {
            return Err(AppError::InvalidState(format!(
                "Software still has {} key(s)",
                keys
            )));
        }
        queries::delete_software(tx, id)?;
        Ok(())
    })?;
    tracing::info!("Deleted software {}", id);
    Ok(())
}

// ============ Key types ============

pub fn create_key_type(conn: &Connection, clock: &dyn Clock, input: &CreateKeyType) -> Result<KeyType> {
    require_name(&input.name, "Key type")?;
    validate_terms(Some(input.hours), Some(input.price))?;
    let key_type = queries::create_key_type(conn, input, clock.timestamp())?;
    tracing::info!("Created key type {} ({})", key_type.id, key_type.name);
    Ok(key_type)
}

pub fn update_key_type(
    conn: &Connection,
    clock: &dyn Clock,
    id: i64,
    input: &UpdateKeyType,
) -> Result<KeyType> {
    if let Some(name) = &input.name {
        require_name(name, "Key type")?;
    }
    validate_terms(input.hours, input.price)?;
    get_key_type(conn, id)?;
    queries::update_key_type(conn, id, input, clock.timestamp())?;
    get_key_type(conn, id)
}

pub fn set_key_type_active(conn: &Connection, clock: &dyn Clock, id: i64, active: bool) -> Result<KeyType> {
    if !queries::set_key_type_active(conn, id, active, clock.timestamp())? {
        return Err(AppError::NotFound("Key type not found".into()));
    }
    tracing::info!("Key type {} active={}", id, active);
    get_key_type(conn, id)
}

/// Delete a key type and its bindings. Refused while any key references it.
pub fn delete_key_type(conn: &mut Connection, id: i64) -> Result<()> {
    atomically(conn, |tx| {
        get_key_type(tx, id)?;
        let keys = queries::count_keys_for_key_type(tx, id)?;
        if keys > 0 {
            return Err(AppError::InvalidState(format!(
                "Key type still has {} key(s)",
                keys
            )));
        }
        queries::delete_key_type(tx, id)?;
        Ok(())
    })?;
    tracing::info!("Deleted key type {}", id);
    Ok(())
}

// ============ Bindings ============

pub fn bind(
    conn: &Connection,
    clock: &dyn Clock,
    software_id: i64,
    key_type_id: i64,
    creator_id: i64,
) -> Result<SoftwareKeyType> {
    get_software(conn, software_id)?;
    get_key_type(conn, key_type_id)?;
    let binding = queries::insert_binding(conn, software_id, key_type_id, creator_id, clock.timestamp())?;
    tracing::info!("Bound key type {} to software {}", key_type_id, software_id);
    Ok(binding)
}

pub fn unbind(conn: &Connection, software_id: i64, key_type_id: i64) -> Result<()> {
    if !queries::delete_binding(conn, software_id, key_type_id)? {
        return Err(AppError::NotFound("Binding not found".into()));
    }
    tracing::info!("Unbound key type {} from software {}", key_type_id, software_id);
    Ok(())
}

pub fn set_binding_active(
    conn: &Connection,
    software_id: i64,
    key_type_id: i64,
    active: bool,
) -> Result<SoftwareKeyType> {
    if !queries::set_binding_active(conn, software_id, key_type_id, active)? {
        return Err(AppError::NotFound("Binding not found".into()));
    }
    queries::get_binding(conn, software_id, key_type_id)?
        .ok_or_else(|| AppError::NotFound("Binding not found".into()))
}

pub fn bound_key_types(conn: &Connection, software_id: i64) -> Result<Vec<BoundKeyType>> {
    get_software(conn, software_id)?;
    queries::list_bound_key_types(conn, software_id)
}

/// Load the pair and check it may be minted right now: both sides active and
/// an active binding between them.
pub fn require_mintable(
    conn: &Connection,
    software_id: i64,
    key_type_id: i64,
) -> Result<(Software, KeyType)> {
    let software = get_software(conn, software_id)?;
    let key_type = get_key_type(conn, key_type_id)?;

    if !key_type.is_active {
        return Err(AppError::Forbidden("Key type is not active".into()));
    }
    if !software.is_active {
        return Err(AppError::Forbidden("Software is not active".into()));
    }
    match queries::get_binding(conn, software_id, key_type_id)? {
        Some(binding) if binding.is_active => Ok((software, key_type)),
        Some(_) => Err(AppError::Forbidden(
            "Key type binding is disabled for this software".into(),
        )),
        None => Err(AppError::Forbidden(
            "Key type is not bound to this software".into(),
        )),
    }
}
