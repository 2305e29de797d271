//! Row mapping for every table, plus the `query_one`/`query_all` helpers.

use std::str::FromStr;

use rusqlite::{Connection, Row, ToSql, types::Type};

use crate::error::Result;
use crate::models::*;

pub trait FromRow: Sized {
    fn from_row(row: &Row) -> rusqlite::Result<Self>;
}

pub fn query_one<T: FromRow>(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> Result<Option<T>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    match rows.next()? {
        Some(row) => Ok(Some(T::from_row(row)?)),
        None => Ok(None),
    }
}

pub fn query_all<T: FromRow>(conn: &Connection, sql: &str, params: &[&dyn ToSql]) -> Result<Vec<T>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| T::from_row(row))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

/// Parse a strum-backed TEXT column.
fn enum_col<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub const SOFTWARE_COLS: &str =
    "id, name, version, announcement, is_active, created_at, updated_at";

impl FromRow for Software {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Software {
            id: row.get(0)?,
            name: row.get(1)?,
            version: row.get(2)?,
            announcement: row.get(3)?,
            is_active: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }
}

pub const KEY_TYPE_COLS: &str =
    "id, name, description, hours, price, is_active, created_at, updated_at";

impl FromRow for KeyType {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(KeyType {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            hours: row.get(3)?,
            price: row.get(4)?,
            is_active: row.get(5)?,
            created_at: row.get(6)?,
            updated_at: row.get(7)?,
        })
    }
}

pub const BINDING_COLS: &str = "id, software_id, key_type_id, is_active, creator_id, created_at";

impl FromRow for SoftwareKeyType {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(SoftwareKeyType {
            id: row.get(0)?,
            software_id: row.get(1)?,
            key_type_id: row.get(2)?,
            is_active: row.get(3)?,
            creator_id: row.get(4)?,
            created_at: row.get(5)?,
        })
    }
}

pub const KEY_COLS: &str = "id, code, key_code, key_type_id, type_name, hours, price, \
     software_id, software_name, status, creator_id, creator_type, salesperson_id, \
     activator_id, device_info, used_at, activated_at, expired_at, is_blacklisted, \
     created_at, updated_at";

impl FromRow for Key {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Key {
            id: row.get(0)?,
            code: row.get(1)?,
            key_code: row.get(2)?,
            key_type_id: row.get(3)?,
            type_name: row.get(4)?,
            hours: row.get(5)?,
            price: row.get(6)?,
            software_id: row.get(7)?,
            software_name: row.get(8)?,
            status: enum_col(row, 9)?,
            creator_id: row.get(10)?,
            creator_type: enum_col(row, 11)?,
            salesperson_id: row.get(12)?,
            activator_id: row.get(13)?,
            device_info: row.get(14)?,
            used_at: row.get(15)?,
            activated_at: row.get(16)?,
            expired_at: row.get(17)?,
            is_blacklisted: row.get(18)?,
            created_at: row.get(19)?,
            updated_at: row.get(20)?,
        })
    }
}

pub const SALESPERSON_COLS: &str = "id, username, password_hash, name, phone, email, status, \
     commission_rate, total_sales, total_commission, parent_id, level, children_count, \
     agent_code, parent_commission_rate, last_login_at, created_at, updated_at";

impl FromRow for Salesperson {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Salesperson {
            id: row.get(0)?,
            username: row.get(1)?,
            password_hash: row.get(2)?,
            name: row.get(3)?,
            phone: row.get(4)?,
            email: row.get(5)?,
            status: enum_col(row, 6)?,
            commission_rate: row.get(7)?,
            total_sales: row.get(8)?,
            total_commission: row.get(9)?,
            parent_id: row.get(10)?,
            level: row.get(11)?,
            children_count: row.get(12)?,
            agent_code: row.get(13)?,
            parent_commission_rate: row.get(14)?,
            last_login_at: row.get(15)?,
            created_at: row.get(16)?,
            updated_at: row.get(17)?,
        })
    }
}

pub const AGENT_SUMMARY_COLS: &str = "id, username, name, level, children_count";

impl FromRow for AgentSummary {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(AgentSummary {
            id: row.get(0)?,
            username: row.get(1)?,
            name: row.get(2)?,
            level: row.get(3)?,
            children_count: row.get(4)?,
        })
    }
}

pub const PRODUCT_COLS: &str = "id, salesperson_id, software_id, key_type_id, commission_rate, \
     key_gen_limit, keys_generated, is_active, created_at, updated_at";

impl FromRow for SalespersonProduct {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(SalespersonProduct {
            id: row.get(0)?,
            salesperson_id: row.get(1)?,
            software_id: row.get(2)?,
            key_type_id: row.get(3)?,
            commission_rate: row.get(4)?,
            key_gen_limit: row.get(5)?,
            keys_generated: row.get(6)?,
            is_active: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}

/// Product columns prefixed with `sp.`, followed by joined catalog fields.
pub const PRODUCT_DETAIL_COLS: &str = "sp.id, sp.salesperson_id, sp.software_id, \
     sp.key_type_id, sp.commission_rate, sp.key_gen_limit, sp.keys_generated, sp.is_active, \
     sp.created_at, sp.updated_at, s.name, kt.name, kt.hours, kt.price";

impl FromRow for SalespersonProductDetail {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(SalespersonProductDetail {
            product: SalespersonProduct::from_row(row)?,
            software_name: row.get(10)?,
            key_type_name: row.get(11)?,
            hours: row.get(12)?,
            price: row.get(13)?,
        })
    }
}

pub const SALE_COLS: &str = "id, salesperson_id, software_id, key_type_id, key_count, \
     sale_amount, commission_rate, commission, status, customer_name, customer_phone, \
     customer_email, notes, settled_at, created_at";

impl FromRow for SalespersonSale {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(SalespersonSale {
            id: row.get(0)?,
            salesperson_id: row.get(1)?,
            software_id: row.get(2)?,
            key_type_id: row.get(3)?,
            key_count: row.get(4)?,
            sale_amount: row.get(5)?,
            commission_rate: row.get(6)?,
            commission: row.get(7)?,
            status: enum_col(row, 8)?,
            customer_name: row.get(9)?,
            customer_phone: row.get(10)?,
            customer_email: row.get(11)?,
            notes: row.get(12)?,
            settled_at: row.get(13)?,
            created_at: row.get(14)?,
        })
    }
}

pub const AGENT_COMMISSION_COLS: &str = "id, sale_id, salesperson_id, agent_id, agent_level, \
     original_amount, commission_rate, commission_amount, status, settlement_id, created_at";

impl FromRow for AgentCommission {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(AgentCommission {
            id: row.get(0)?,
            sale_id: row.get(1)?,
            salesperson_id: row.get(2)?,
            agent_id: row.get(3)?,
            agent_level: row.get(4)?,
            original_amount: row.get(5)?,
            commission_rate: row.get(6)?,
            commission_amount: row.get(7)?,
            status: enum_col(row, 8)?,
            settlement_id: row.get(9)?,
            created_at: row.get(10)?,
        })
    }
}

pub const INVITATION_COLS: &str = "id, inviter_id, invitee_id, invite_code, email, phone, \
     status, accepted_at, expired_at, created_at";

impl FromRow for AgentInvitation {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(AgentInvitation {
            id: row.get(0)?,
            inviter_id: row.get(1)?,
            invitee_id: row.get(2)?,
            invite_code: row.get(3)?,
            email: row.get(4)?,
            phone: row.get(5)?,
            status: enum_col(row, 6)?,
            accepted_at: row.get(7)?,
            expired_at: row.get(8)?,
            created_at: row.get(9)?,
        })
    }
}

pub const AGENT_NODE_COLS: &str = "id, parent_id, level, parent_commission_rate";

impl FromRow for AgentNode {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(AgentNode {
            id: row.get(0)?,
            parent_id: row.get(1)?,
            level: row.get(2)?,
            parent_commission_rate: row.get(3)?,
        })
    }
}
