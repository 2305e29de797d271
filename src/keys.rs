//! Key lifecycle: mint, activate, void, blacklist, and read-only projections.
//!
//! ```text
//! unused --activate--> used
//! {unused, used} --void--> void   (terminal)
//! ```

use chrono::DateTime;
use rusqlite::Connection;
use serde::Deserialize;
use strum::{AsRefStr, EnumString};

use crate::catalog;
use crate::clock::{Clock, SECONDS_PER_HOUR};
use crate::codegen::CodeGenerator;
use crate::db::{atomically, queries};
use crate::error::{AppError, Result, is_unique_violation};
use crate::models::*;

pub const MAX_MINT_COUNT: i64 = 1000;

/// Fresh codes drawn per key before giving up on collisions.
const MAX_CODE_ATTEMPTS: usize = 5;

/// Who is minting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Creator {
    Admin(i64),
    Salesperson(i64),
}

impl Creator {
    fn id(self) -> i64 {
        match self {
            Creator::Admin(id) | Creator::Salesperson(id) => id,
        }
    }

    fn kind(self) -> CreatorType {
        match self {
            Creator::Admin(_) => CreatorType::Admin,
            Creator::Salesperson(_) => CreatorType::Salesperson,
        }
    }

    fn salesperson_id(self) -> Option<i64> {
        match self {
            Creator::Admin(_) => None,
            Creator::Salesperson(id) => Some(id),
        }
    }

    /// `(share code, activation code)` in the style for this creator.
    fn draw_codes(self, codes: &CodeGenerator) -> (String, String) {
        match self {
            Creator::Admin(_) => (codes.share_code(), codes.activation_code()),
            Creator::Salesperson(_) => {
                (codes.salesperson_sale_code(), codes.salesperson_key_code())
            }
        }
    }
}

pub fn validate_count(count: i64) -> Result<()> {
    if !(1..=MAX_MINT_COUNT).contains(&count) {
        return Err(AppError::BadRequest(format!(
            "count must be between 1 and {}",
            MAX_MINT_COUNT
        )));
    }
    Ok(())
}

/// Insert `count` keys on an open transaction.
///
/// A code collision only redraws that key's codes; the batch as a whole
/// still commits or rolls back with the caller's transaction.
pub(crate) fn mint_in(
    tx: &Connection,
    codes: &CodeGenerator,
    now: i64,
    software: &Software,
    key_type: &KeyType,
    count: i64,
    creator: Creator,
) -> Result<Vec<Key>> {
    let mut keys = Vec::with_capacity(usize::try_from(count).unwrap_or(0));

    for _ in 0..count {
        let mut inserted = None;
        for _ in 0..MAX_CODE_ATTEMPTS {
            let (code, key_code) = creator.draw_codes(codes);
            let row = queries::NewKey {
                code: &code,
                key_code: &key_code,
                key_type,
                software,
                creator_id: creator.id(),
                creator_type: creator.kind(),
                salesperson_id: creator.salesperson_id(),
            };
            match queries::insert_key(tx, &row, now) {
                Ok(id) => {
                    inserted = Some((id, code, key_code));
                    break;
                }
                Err(e) if is_unique_violation(&e) => {
                    tracing::warn!("Key code collision, redrawing");
                }
                Err(e) => return Err(e.into()),
            }
        }

        let (id, code, key_code) = inserted
            .ok_or_else(|| AppError::Internal("Could not generate a unique key code".into()))?;
        keys.push(Key {
            id,
            code,
            key_code,
            key_type_id: key_type.id,
            type_name: key_type.name.clone(),
            hours: key_type.hours,
            price: key_type.price,
            software_id: software.id,
            software_name: software.name.clone(),
            status: KeyStatus::Unused,
            creator_id: creator.id(),
            creator_type: creator.kind(),
            salesperson_id: creator.salesperson_id(),
            activator_id: None,
            device_info: None,
            used_at: None,
            activated_at: None,
            expired_at: None,
            is_blacklisted: false,
            created_at: now,
            updated_at: now,
        });
    }
    Ok(keys)
}

/// Mint a batch of keys for a bound (software, key type) pair.
///
/// All `count` keys persist or none do.
pub fn mint(
    conn: &mut Connection,
    codes: &CodeGenerator,
    clock: &dyn Clock,
    input: &MintKeys,
    creator: Creator,
) -> Result<Vec<Key>> {
    validate_count(input.count)?;
    let now = clock.timestamp();

    let keys = atomically(conn, |tx| {
        let (software, key_type) =
            catalog::require_mintable(tx, input.software_id, input.key_type_id)?;
        mint_in(tx, codes, now, &software, &key_type, input.count, creator)
    })?;

    tracing::info!(
        "Minted {} key(s) for software {} type {} by {:?}",
        keys.len(),
        input.software_id,
        input.key_type_id,
        creator
    );
    Ok(keys)
}

/// `now + hours`, refusing validity that does not fit in a timestamp.
fn expiry(now: i64, hours: i64) -> Result<i64> {
    hours
        .checked_mul(SECONDS_PER_HOUR)
        .and_then(|secs| now.checked_add(secs))
        .ok_or_else(|| AppError::BadRequest(format!("Key validity of {} hours is out of range", hours)))
}

/// Redeem a key exactly once.
pub fn activate(conn: &mut Connection, clock: &dyn Clock, input: &ActivateKey) -> Result<Key> {
    if input.code.trim().is_empty() || input.key_code.trim().is_empty() {
        return Err(AppError::BadRequest("code and key_code are required".into()));
    }
    let now = clock.timestamp();

    let key = atomically(conn, |tx| {
        let key = queries::get_key_by_codes(tx, input.code.trim(), input.key_code.trim())?
            .ok_or_else(|| AppError::NotFound("Key not found".into()))?;

        if key.status != KeyStatus::Unused {
            return Err(AppError::InvalidState(format!(
                "Key is already {}",
                key.status.as_ref()
            )));
        }
        if key.software_id != input.software_id {
            return Err(AppError::Mismatch(
                "Key does not belong to this software".into(),
            ));
        }
        let software_active = queries::get_software(tx, key.software_id)?
            .is_some_and(|s| s.is_active);
        if !software_active {
            return Err(AppError::Mismatch("Software is not active".into()));
        }
        if key.is_blacklisted {
            return Err(AppError::Forbidden("Key is blacklisted".into()));
        }

        let expires_at = expiry(now, key.hours)?;
        let device_info = input.device_info.as_deref();
        if !queries::mark_key_used(tx, key.id, now, expires_at, device_info, input.activator_id)? {
            return Err(AppError::InvalidState("Key is no longer unused".into()));
        }

        Ok(Key {
            status: KeyStatus::Used,
            used_at: Some(now),
            activated_at: Some(now),
            expired_at: Some(expires_at),
            device_info: input.device_info.clone(),
            activator_id: input.activator_id,
            updated_at: now,
            ..key
        })
    })?;

    tracing::info!("Activated key {} for software {}", key.id, key.software_id);
    Ok(key)
}

/// Void a key from any non-void state.
pub fn void(conn: &mut Connection, clock: &dyn Clock, id: i64) -> Result<Key> {
    let now = clock.timestamp();
    let key = atomically(conn, |tx| {
        let key = queries::get_key(tx, id)?
            .ok_or_else(|| AppError::NotFound("Key not found".into()))?;
        if key.status == KeyStatus::Void || !queries::mark_key_void(tx, id, now)? {
            return Err(AppError::InvalidState("Key is already void".into()));
        }
        Ok(Key {
            status: KeyStatus::Void,
            updated_at: now,
            ..key
        })
    })?;
    tracing::info!("Voided key {}", key.id);
    Ok(key)
}

pub fn set_blacklisted(conn: &Connection, clock: &dyn Clock, id: i64, blacklisted: bool) -> Result<Key> {
    if !queries::set_key_blacklisted(conn, id, blacklisted, clock.timestamp())? {
        return Err(AppError::NotFound("Key not found".into()));
    }
    tracing::info!("Key {} blacklisted={}", id, blacklisted);
    get_key(conn, id)
}

pub fn get_key(conn: &Connection, id: i64) -> Result<Key> {
    queries::get_key(conn, id)?.ok_or_else(|| AppError::NotFound("Key not found".into()))
}

/// Public status lookup by share code, activation code, or both.
pub fn key_status(
    conn: &Connection,
    clock: &dyn Clock,
    code: Option<&str>,
    key_code: Option<&str>,
) -> Result<KeyStatusView> {
    let code = code.map(str::trim).filter(|c| !c.is_empty());
    let key_code = key_code.map(str::trim).filter(|c| !c.is_empty());

    let key = match (code, key_code) {
        (Some(code), Some(key_code)) => queries::get_key_by_codes(conn, code, key_code)?,
        (Some(code), None) => queries::get_key_by_code(conn, code)?,
        (None, Some(key_code)) => queries::get_key_by_key_code(conn, key_code)?,
        (None, None) => {
            return Err(AppError::BadRequest("code or key_code is required".into()));
        }
    }
    .ok_or_else(|| AppError::NotFound("Key not found".into()))?;

    Ok(KeyStatusView::from_key(key, clock.timestamp()))
}

/// Restrict a filter to one salesperson's keys when `scope` is set.
fn scoped(filter: &KeyFilter, scope: Option<i64>) -> KeyFilter {
    let mut filter = filter.clone();
    if let Some(id) = scope {
        filter.salesperson_id = Some(id);
    }
    filter
}

pub fn list(conn: &Connection, filter: &KeyFilter, scope: Option<i64>) -> Result<Page<Key>> {
    queries::list_keys(conn, &scoped(filter, scope))
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, AsRefStr, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

/// A rendered export ready to send.
pub struct Export {
    pub content_type: &'static str,
    pub filename: String,
    pub body: String,
}

pub fn export(
    conn: &Connection,
    clock: &dyn Clock,
    filter: &KeyFilter,
    scope: Option<i64>,
    format: ExportFormat,
) -> Result<Export> {
    let keys = queries::export_keys(conn, &scoped(filter, scope))?;
    let stamp = clock.now().format("%Y%m%d%H%M%S");
    tracing::info!("Exporting {} key(s) as {}", keys.len(), format.as_ref());

    match format {
        ExportFormat::Csv => Ok(Export {
            content_type: "text/csv; charset=utf-8",
            filename: format!("keys_{}.csv", stamp),
            body: render_csv(&keys),
        }),
        ExportFormat::Json => Ok(Export {
            content_type: "application/json",
            filename: format!("keys_{}.json", stamp),
            body: serde_json::to_string_pretty(&keys)
                .map_err(|e| AppError::Internal(format!("Failed to encode keys: {}", e)))?,
        }),
    }
}

const CSV_HEADER: &str = "id,code,key_code,type_name,hours,price,software_name,status,\
creator_type,creator_id,salesperson_id,activator_id,device_info,activated_at,expired_at,\
is_blacklisted,created_at";

/// Quote a field if it holds a comma, quote or line break.
pub fn escape_csv(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn format_time(ts: Option<i64>) -> String {
    ts.and_then(|t| DateTime::from_timestamp(t, 0))
        .map(|dt| dt.to_rfc3339())
        .unwrap_or_default()
}

fn opt_id(id: Option<i64>) -> String {
    id.map(|v| v.to_string()).unwrap_or_default()
}

pub fn render_csv(keys: &[Key]) -> String {
    let mut out = String::from(CSV_HEADER);
    out.push('\n');
    for key in keys {
        let fields = [
            key.id.to_string(),
            escape_csv(&key.code),
            escape_csv(&key.key_code),
            escape_csv(&key.type_name),
            key.hours.to_string(),
            format!("{:.2}", key.price),
            escape_csv(&key.software_name),
            key.status.as_ref().to_string(),
            key.creator_type.as_ref().to_string(),
            key.creator_id.to_string(),
            opt_id(key.salesperson_id),
            opt_id(key.activator_id),
            escape_csv(key.device_info.as_deref().unwrap_or_default()),
            format_time(key.activated_at),
            format_time(key.expired_at),
            key.is_blacklisted.to_string(),
            format_time(Some(key.created_at)),
        ];
        out.push_str(&fields.join(","));
        out.push('\n');
    }
    out
}
