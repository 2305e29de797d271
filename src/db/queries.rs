use rusqlite::{Connection, OptionalExtension, ToSql, params, types::Value};

use crate::error::{AppError, Result, is_unique_violation};
use crate::models::*;

use super::from_row::{
    AGENT_COMMISSION_COLS, AGENT_NODE_COLS, AGENT_SUMMARY_COLS, BINDING_COLS, INVITATION_COLS, KEY_COLS,
    KEY_TYPE_COLS, PRODUCT_COLS, PRODUCT_DETAIL_COLS, SALE_COLS, SALESPERSON_COLS,
    SOFTWARE_COLS, query_all, query_one,
};

/// Builder for dynamic UPDATE statements with optional fields.
/// Combines multiple field updates into a single query.
struct UpdateBuilder {
    table: &'static str,
    id: i64,
    fields: Vec<(&'static str, Value)>,
    updated_at: Option<i64>,
}

impl UpdateBuilder {
    fn new(table: &'static str, id: i64) -> Self {
        Self {
            table,
            id,
            fields: Vec::new(),
            updated_at: None,
        }
    }

    fn with_updated_at(mut self, now: i64) -> Self {
        self.updated_at = Some(now);
        self
    }

    fn set(mut self, column: &'static str, value: impl Into<Value>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    fn set_opt<V: Into<Value>>(self, column: &'static str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.set(column, v),
            None => self,
        }
    }

    /// `Some(None)` writes NULL, `None` leaves the column alone.
    fn set_nullable<V: Into<Value>>(mut self, column: &'static str, value: Option<Option<V>>) -> Self {
        match value {
            Some(Some(v)) => self.fields.push((column, v.into())),
            Some(None) => self.fields.push((column, Value::Null)),
            None => {}
        }
        self
    }

    fn execute(mut self, conn: &Connection) -> Result<bool> {
        if self.fields.is_empty() {
            return Ok(false);
        }
        if let Some(now) = self.updated_at {
            self.fields.push(("updated_at", now.into()));
        }
        let sets: Vec<String> = self
            .fields
            .iter()
            .map(|(col, _)| format!("{} = ?", col))
            .collect();
        let mut values: Vec<Value> = self.fields.into_iter().map(|(_, v)| v).collect();
        values.push(self.id.into());
        let sql = format!("UPDATE {} SET {} WHERE id = ?", self.table, sets.join(", "));
        let affected = conn.execute(&sql, rusqlite::params_from_iter(values))?;
        Ok(affected > 0)
    }
}

/// WHERE-clause accumulator for filtered listings.
#[derive(Default)]
struct Filter {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl Filter {
    fn equals(mut self, column: &str, value: Option<impl Into<Value>>) -> Self {
        if let Some(v) = value {
            self.clauses.push(format!("{} = ?", column));
            self.values.push(v.into());
        }
        self
    }

    fn contains(mut self, column: &str, value: Option<&str>) -> Self {
        if let Some(v) = value.filter(|v| !v.is_empty()) {
            self.clauses.push(format!("{} LIKE ?", column));
            self.values.push(format!("%{}%", v).into());
        }
        self
    }

    fn since(mut self, column: &str, value: Option<i64>) -> Self {
        if let Some(v) = value {
            self.clauses.push(format!("{} >= ?", column));
            self.values.push(v.into());
        }
        self
    }

    fn until(mut self, column: &str, value: Option<i64>) -> Self {
        if let Some(v) = value {
            self.clauses.push(format!("{} <= ?", column));
            self.values.push(v.into());
        }
        self
    }

    fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    fn params(&self) -> Vec<&dyn ToSql> {
        self.values.iter().map(|v| v as &dyn ToSql).collect()
    }

    fn count(&self, conn: &Connection, table: &str) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM {}{}", table, self.where_sql());
        Ok(conn.query_row(&sql, self.params().as_slice(), |row| row.get(0))?)
    }

    /// Newest-first page of rows plus the unpaginated total.
    fn page<T: super::FromRow>(
        self,
        conn: &Connection,
        table: &str,
        cols: &str,
        page: Option<i64>,
        page_size: Option<i64>,
    ) -> Result<Page<T>> {
        let total = self.count(conn, table)?;
        let (page, page_size, offset) = paging(page, page_size);
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY id DESC LIMIT {} OFFSET {}",
            cols,
            table,
            self.where_sql(),
            page_size,
            offset
        );
        let items = query_all(conn, &sql, self.params().as_slice())?;
        Ok(Page {
            items,
            total,
            page,
            page_size,
        })
    }
}

fn conflict(err: rusqlite::Error, what: &str) -> AppError {
    if is_unique_violation(&err) {
        AppError::InvalidState(format!("{} already exists", what))
    } else {
        err.into()
    }
}

// ============ Software ============

pub fn create_software(conn: &Connection, input: &CreateSoftware, now: i64) -> Result<Software> {
    conn.execute(
        "INSERT INTO software (name, version, announcement, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, 1, ?4, ?4)",
        params![&input.name, &input.version, &input.announcement, now],
    )
    .map_err(|e| conflict(e, "Software name"))?;

    Ok(Software {
        id: conn.last_insert_rowid(),
        name: input.name.clone(),
        version: input.version.clone(),
        announcement: input.announcement.clone(),
        is_active: true,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_software(conn: &Connection, id: i64) -> Result<Option<Software>> {
    query_one(
        conn,
        &format!("SELECT {} FROM software WHERE id = ?1", SOFTWARE_COLS),
        &[&id],
    )
}

pub fn list_software(conn: &Connection, filter: &CatalogFilter) -> Result<Page<Software>> {
    Filter::default()
        .equals("is_active", filter.is_active)
        .contains("name", filter.name.as_deref())
        .page(conn, "software", SOFTWARE_COLS, filter.page, filter.page_size)
}

pub fn update_software(conn: &Connection, id: i64, input: &UpdateSoftware, now: i64) -> Result<bool> {
    UpdateBuilder::new("software", id)
        .with_updated_at(now)
        .set_opt("name", input.name.clone())
        .set_opt("version", input.version.clone())
        .set_nullable("announcement", input.announcement.clone())
        .execute(conn)
        .map_err(|e| match e {
            AppError::Database(inner) => conflict(inner, "Software name"),
            other => other,
        })
}

pub fn set_software_active(conn: &Connection, id: i64, active: bool, now: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE software SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
        params![active, now, id],
    )?;
    Ok(affected > 0)
}

/// Delete a software together with its bindings.
pub fn delete_software(conn: &Connection, id: i64) -> Result<bool> {
    conn.execute("DELETE FROM software_key_types WHERE software_id = ?1", params![id])?;
    let affected = conn.execute("DELETE FROM software WHERE id = ?1", params![id])?;
    Ok(affected > 0)
}

pub fn count_keys_for_software(conn: &Connection, software_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM keys WHERE software_id = ?1",
        params![software_id],
        |row| row.get(0),
    )?)
}

// ============ Key types ============

pub fn create_key_type(conn: &Connection, input: &CreateKeyType, now: i64) -> Result<KeyType> {
    conn.execute(
        "INSERT INTO key_types (name, description, hours, price, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
        params![&input.name, &input.description, input.hours, input.price, now],
    )
    .map_err(|e| conflict(e, "Key type name"))?;

    Ok(KeyType {
        id: conn.last_insert_rowid(),
        name: input.name.clone(),
        description: input.description.clone(),
        hours: input.hours,
        price: input.price,
        is_active: true,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_key_type(conn: &Connection, id: i64) -> Result<Option<KeyType>> {
    query_one(
        conn,
        &format!("SELECT {} FROM key_types WHERE id = ?1", KEY_TYPE_COLS),
        &[&id],
    )
}

pub fn list_key_types(conn: &Connection, filter: &CatalogFilter) -> Result<Page<KeyType>> {
    Filter::default()
        .equals("is_active", filter.is_active)
        .contains("name", filter.name.as_deref())
        .page(conn, "key_types", KEY_TYPE_COLS, filter.page, filter.page_size)
}

pub fn update_key_type(conn: &Connection, id: i64, input: &UpdateKeyType, now: i64) -> Result<bool> {
    UpdateBuilder::new("key_types", id)
        .with_updated_at(now)
        .set_opt("name", input.name.clone())
        .set_nullable("description", input.description.clone())
        .set_opt("hours", input.hours)
        .set_opt("price", input.price)
        .execute(conn)
        .map_err(|e| match e {
            AppError::Database(inner) => conflict(inner, "Key type name"),
            other => other,
        })
}

pub fn set_key_type_active(conn: &Connection, id: i64, active: bool, now: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE key_types SET is_active = ?1, updated_at = ?2 WHERE id = ?3",
        params![active, now, id],
    )?;
    Ok(affected > 0)
}

pub fn delete_key_type(conn: &Connection, id: i64) -> Result<bool> {
    conn.execute("DELETE FROM software_key_types WHERE key_type_id = ?1", params![id])?;
    let affected = conn.execute("DELETE FROM key_types WHERE id = ?1", params![id])?;
    Ok(affected > 0)
}

pub fn count_keys_for_key_type(conn: &Connection, key_type_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM keys WHERE key_type_id = ?1",
        params![key_type_id],
        |row| row.get(0),
    )?)
}

// ============ Bindings ============

pub fn insert_binding(
    conn: &Connection,
    software_id: i64,
    key_type_id: i64,
    creator_id: i64,
    now: i64,
) -> Result<SoftwareKeyType> {
    conn.execute(
        "INSERT INTO software_key_types (software_id, key_type_id, is_active, creator_id, created_at)
         VALUES (?1, ?2, 1, ?3, ?4)",
        params![software_id, key_type_id, creator_id, now],
    )
    .map_err(|e| conflict(e, "Binding"))?;

    Ok(SoftwareKeyType {
        id: conn.last_insert_rowid(),
        software_id,
        key_type_id,
        is_active: true,
        creator_id,
        created_at: now,
    })
}

pub fn get_binding(
    conn: &Connection,
    software_id: i64,
    key_type_id: i64,
) -> Result<Option<SoftwareKeyType>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM software_key_types WHERE software_id = ?1 AND key_type_id = ?2",
            BINDING_COLS
        ),
        &[&software_id, &key_type_id],
    )
}

pub fn delete_binding(conn: &Connection, software_id: i64, key_type_id: i64) -> Result<bool> {
    let affected = conn.execute(
        "DELETE FROM software_key_types WHERE software_id = ?1 AND key_type_id = ?2",
        params![software_id, key_type_id],
    )?;
    Ok(affected > 0)
}

pub fn set_binding_active(
    conn: &Connection,
    software_id: i64,
    key_type_id: i64,
    active: bool,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE software_key_types SET is_active = ?1 WHERE software_id = ?2 AND key_type_id = ?3",
        params![active, software_id, key_type_id],
    )?;
    Ok(affected > 0)
}

pub fn list_bound_key_types(conn: &Connection, software_id: i64) -> Result<Vec<BoundKeyType>> {
    let mut stmt = conn.prepare(
        "SELECT kt.id, kt.name, kt.description, kt.hours, kt.price, kt.is_active,
                kt.created_at, kt.updated_at, b.is_active
         FROM software_key_types b
         JOIN key_types kt ON kt.id = b.key_type_id
         WHERE b.software_id = ?1
         ORDER BY kt.id",
    )?;
    let rows = stmt.query_map(params![software_id], |row| {
        Ok(BoundKeyType {
            key_type: <KeyType as super::FromRow>::from_row(row)?,
            binding_active: row.get(8)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

// ============ Keys ============

/// Column values for a key about to be inserted.
pub struct NewKey<'a> {
    pub code: &'a str,
    pub key_code: &'a str,
    pub key_type: &'a KeyType,
    pub software: &'a Software,
    pub creator_id: i64,
    pub creator_type: CreatorType,
    pub salesperson_id: Option<i64>,
}

/// Insert one key. The raw rusqlite error is returned so the caller can
/// retry on a code collision.
pub fn insert_key(conn: &Connection, key: &NewKey<'_>, now: i64) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO keys (code, key_code, key_type_id, type_name, hours, price, software_id,
                           software_name, status, creator_id, creator_type, salesperson_id,
                           is_blacklisted, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'unused', ?9, ?10, ?11, 0, ?12, ?12)",
        params![
            key.code,
            key.key_code,
            key.key_type.id,
            &key.key_type.name,
            key.key_type.hours,
            key.key_type.price,
            key.software.id,
            &key.software.name,
            key.creator_id,
            key.creator_type.as_ref(),
            key.salesperson_id,
            now,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_key(conn: &Connection, id: i64) -> Result<Option<Key>> {
    query_one(
        conn,
        &format!("SELECT {} FROM keys WHERE id = ?1", KEY_COLS),
        &[&id],
    )
}

pub fn get_key_by_codes(conn: &Connection, code: &str, key_code: &str) -> Result<Option<Key>> {
    query_one(
        conn,
        &format!("SELECT {} FROM keys WHERE code = ?1 AND key_code = ?2", KEY_COLS),
        &[&code, &key_code],
    )
}

pub fn get_key_by_code(conn: &Connection, code: &str) -> Result<Option<Key>> {
    query_one(
        conn,
        &format!("SELECT {} FROM keys WHERE code = ?1", KEY_COLS),
        &[&code],
    )
}

pub fn get_key_by_key_code(conn: &Connection, key_code: &str) -> Result<Option<Key>> {
    query_one(
        conn,
        &format!("SELECT {} FROM keys WHERE key_code = ?1", KEY_COLS),
        &[&key_code],
    )
}

/// Move an unused key to `used`. Returns false if the key was no longer unused.
pub fn mark_key_used(
    conn: &Connection,
    id: i64,
    now: i64,
    expires_at: i64,
    device_info: Option<&str>,
    activator_id: Option<i64>,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE keys SET status = 'used', used_at = ?1, activated_at = ?1, expired_at = ?2,
                         device_info = ?3, activator_id = ?4, updated_at = ?1
         WHERE id = ?5 AND status = 'unused'",
        params![now, expires_at, device_info, activator_id, id],
    )?;
    Ok(affected == 1)
}

/// Void a key. Returns false if it was already void.
pub fn mark_key_void(conn: &Connection, id: i64, now: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE keys SET status = 'void', updated_at = ?1 WHERE id = ?2 AND status != 'void'",
        params![now, id],
    )?;
    Ok(affected == 1)
}

pub fn set_key_blacklisted(conn: &Connection, id: i64, blacklisted: bool, now: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE keys SET is_blacklisted = ?1, updated_at = ?2 WHERE id = ?3",
        params![blacklisted, now, id],
    )?;
    Ok(affected > 0)
}

fn key_filter(filter: &KeyFilter) -> Filter {
    Filter::default()
        .equals("status", filter.status.map(|s| s.as_ref().to_string()))
        .equals("key_type_id", filter.key_type_id)
        .equals("software_id", filter.software_id)
        .equals("creator_id", filter.creator_id)
        .equals("creator_type", filter.creator_type.map(|c| c.as_ref().to_string()))
        .equals("salesperson_id", filter.salesperson_id)
        .equals("activator_id", filter.activator_id)
        .contains("code", filter.code.as_deref())
        .contains("key_code", filter.key_code.as_deref())
        .since("created_at", filter.start_time)
        .until("created_at", filter.end_time)
}

pub fn list_keys(conn: &Connection, filter: &KeyFilter) -> Result<Page<Key>> {
    key_filter(filter).page(conn, "keys", KEY_COLS, filter.page, filter.page_size)
}

/// Every key matching `filter`, ignoring pagination.
pub fn export_keys(conn: &Connection, filter: &KeyFilter) -> Result<Vec<Key>> {
    let f = key_filter(filter);
    let sql = format!("SELECT {} FROM keys{} ORDER BY id DESC", KEY_COLS, f.where_sql());
    query_all(conn, &sql, f.params().as_slice())
}

// ============ Salespeople ============

pub fn create_salesperson(
    conn: &Connection,
    input: &CreateSalesperson,
    password_hash: &str,
    now: i64,
) -> Result<Salesperson> {
    conn.execute(
        "INSERT INTO salespeople (username, password_hash, name, phone, email, status,
                                  commission_rate, parent_commission_rate, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 'active', ?6, ?7, ?8, ?8)",
        params![
            &input.username,
            password_hash,
            &input.name,
            &input.phone,
            &input.email,
            input.commission_rate,
            input.parent_commission_rate,
            now,
        ],
    )
    .map_err(|e| conflict(e, "Username"))?;

    Ok(Salesperson {
        id: conn.last_insert_rowid(),
        username: input.username.clone(),
        password_hash: password_hash.to_string(),
        name: input.name.clone(),
        phone: input.phone.clone(),
        email: input.email.clone(),
        status: SalespersonStatus::Active,
        commission_rate: input.commission_rate,
        total_sales: 0.0,
        total_commission: 0.0,
        parent_id: None,
        level: 0,
        children_count: 0,
        agent_code: None,
        parent_commission_rate: input.parent_commission_rate,
        last_login_at: None,
        created_at: now,
        updated_at: now,
    })
}

pub fn get_salesperson(conn: &Connection, id: i64) -> Result<Option<Salesperson>> {
    query_one(
        conn,
        &format!("SELECT {} FROM salespeople WHERE id = ?1", SALESPERSON_COLS),
        &[&id],
    )
}

pub fn get_salesperson_by_username(conn: &Connection, username: &str) -> Result<Option<Salesperson>> {
    query_one(
        conn,
        &format!("SELECT {} FROM salespeople WHERE username = ?1", SALESPERSON_COLS),
        &[&username],
    )
}

pub fn list_salespeople(conn: &Connection, filter: &SalespersonFilter) -> Result<Page<Salesperson>> {
    Filter::default()
        .equals("status", filter.status.map(|s| s.as_ref().to_string()))
        .contains("username", filter.username.as_deref())
        .page(conn, "salespeople", SALESPERSON_COLS, filter.page, filter.page_size)
}

pub fn update_salesperson(
    conn: &Connection,
    id: i64,
    input: &UpdateSalesperson,
    password_hash: Option<String>,
    now: i64,
) -> Result<bool> {
    UpdateBuilder::new("salespeople", id)
        .with_updated_at(now)
        .set_opt("name", input.name.clone())
        .set_nullable("phone", input.phone.clone())
        .set_nullable("email", input.email.clone())
        .set_opt("status", input.status.map(|s| s.as_ref().to_string()))
        .set_opt("commission_rate", input.commission_rate)
        .set_opt("parent_commission_rate", input.parent_commission_rate)
        .set_opt("password_hash", password_hash)
        .execute(conn)
}

pub fn delete_salesperson(conn: &Connection, id: i64) -> Result<bool> {
    let affected = conn.execute("DELETE FROM salespeople WHERE id = ?1", params![id])?;
    Ok(affected > 0)
}

/// Assign an agent code only if none is set yet. Returns false if one was.
pub fn set_agent_code(conn: &Connection, id: i64, code: &str, now: i64) -> rusqlite::Result<bool> {
    let affected = conn.execute(
        "UPDATE salespeople SET agent_code = ?1, updated_at = ?2
         WHERE id = ?3 AND agent_code IS NULL",
        params![code, now, id],
    )?;
    Ok(affected == 1)
}

pub fn touch_last_login(conn: &Connection, id: i64, now: i64) -> Result<()> {
    conn.execute(
        "UPDATE salespeople SET last_login_at = ?1 WHERE id = ?2",
        params![now, id],
    )?;
    Ok(())
}

pub fn add_sale_totals(conn: &Connection, id: i64, amount: f64, commission: f64) -> Result<()> {
    conn.execute(
        "UPDATE salespeople SET total_sales = total_sales + ?1,
                                total_commission = total_commission + ?2
         WHERE id = ?3",
        params![amount, commission, id],
    )?;
    Ok(())
}

pub fn add_commission_total(conn: &Connection, id: i64, amount: f64) -> Result<()> {
    conn.execute(
        "UPDATE salespeople SET total_commission = total_commission + ?1 WHERE id = ?2",
        params![amount, id],
    )?;
    Ok(())
}

pub fn adjust_children_count(conn: &Connection, id: i64, delta: i64) -> Result<()> {
    conn.execute(
        "UPDATE salespeople SET children_count = children_count + ?1 WHERE id = ?2",
        params![delta, id],
    )?;
    Ok(())
}

/// Attach `id` under `parent_id` at `level`. Refuses nodes that already have a parent.
pub fn attach_to_parent(
    conn: &Connection,
    id: i64,
    parent_id: i64,
    level: i64,
    now: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE salespeople SET parent_id = ?1, level = ?2, updated_at = ?3
         WHERE id = ?4 AND parent_id IS NULL",
        params![parent_id, level, now, id],
    )?;
    Ok(affected == 1)
}

pub fn shift_level(conn: &Connection, id: i64, delta: i64) -> Result<()> {
    conn.execute(
        "UPDATE salespeople SET level = level + ?1 WHERE id = ?2",
        params![delta, id],
    )?;
    Ok(())
}

pub fn child_ids(conn: &Connection, parent_id: i64) -> Result<Vec<i64>> {
    let mut stmt = conn.prepare("SELECT id FROM salespeople WHERE parent_id = ?1 ORDER BY id")?;
    let ids = stmt.query_map(params![parent_id], |row| row.get(0))?;
    Ok(ids.collect::<rusqlite::Result<Vec<i64>>>()?)
}

pub fn count_children(conn: &Connection, parent_id: i64) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM salespeople WHERE parent_id = ?1",
        params![parent_id],
        |row| row.get(0),
    )?)
}

pub fn get_agent_node(conn: &Connection, id: i64) -> Result<Option<AgentNode>> {
    query_one(
        conn,
        &format!("SELECT {} FROM salespeople WHERE id = ?1", AGENT_NODE_COLS),
        &[&id],
    )
}

pub fn get_agent_summary(conn: &Connection, id: i64) -> Result<Option<AgentSummary>> {
    query_one(
        conn,
        &format!("SELECT {} FROM salespeople WHERE id = ?1", AGENT_SUMMARY_COLS),
        &[&id],
    )
}

pub fn list_children(conn: &Connection, parent_id: i64) -> Result<Vec<AgentSummary>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM salespeople WHERE parent_id = ?1 ORDER BY id",
            AGENT_SUMMARY_COLS
        ),
        &[&parent_id],
    )
}

// ============ Product assignments ============

pub fn get_product(
    conn: &Connection,
    salesperson_id: i64,
    software_id: i64,
    key_type_id: i64,
) -> Result<Option<SalespersonProduct>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM salesperson_products
             WHERE salesperson_id = ?1 AND software_id = ?2 AND key_type_id = ?3",
            PRODUCT_COLS
        ),
        &[&salesperson_id, &software_id, &key_type_id],
    )
}

pub fn get_product_by_id(conn: &Connection, id: i64) -> Result<Option<SalespersonProduct>> {
    query_one(
        conn,
        &format!("SELECT {} FROM salesperson_products WHERE id = ?1", PRODUCT_COLS),
        &[&id],
    )
}

pub fn insert_product(
    conn: &Connection,
    salesperson_id: i64,
    input: &AssignProduct,
    now: i64,
) -> Result<i64> {
    conn.execute(
        "INSERT INTO salesperson_products (salesperson_id, software_id, key_type_id,
             commission_rate, key_gen_limit, keys_generated, is_active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, 1, ?6, ?6)",
        params![
            salesperson_id,
            input.software_id,
            input.key_type_id,
            input.commission_rate.unwrap_or(0.0),
            input.key_gen_limit.unwrap_or(0),
            now,
        ],
    )
    .map_err(|e| conflict(e, "Assignment"))?;
    Ok(conn.last_insert_rowid())
}

/// Reactivate an assignment, overriding rate and limit when provided.
pub fn reactivate_product(
    conn: &Connection,
    id: i64,
    commission_rate: Option<f64>,
    key_gen_limit: Option<i64>,
    now: i64,
) -> Result<bool> {
    UpdateBuilder::new("salesperson_products", id)
        .with_updated_at(now)
        .set("is_active", true)
        .set_opt("commission_rate", commission_rate)
        .set_opt("key_gen_limit", key_gen_limit)
        .execute(conn)
}

pub fn list_products(conn: &Connection, salesperson_id: i64) -> Result<Vec<SalespersonProductDetail>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM salesperson_products sp
             JOIN software s ON s.id = sp.software_id
             JOIN key_types kt ON kt.id = sp.key_type_id
             WHERE sp.salesperson_id = ?1
             ORDER BY sp.id",
            PRODUCT_DETAIL_COLS
        ),
        &[&salesperson_id],
    )
}

/// Add `count` to `keys_generated` unless that would pass a nonzero limit.
/// Returns false when the quota refused the increment.
pub fn reserve_quota(conn: &Connection, product_id: i64, count: i64, now: i64) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE salesperson_products
         SET keys_generated = keys_generated + ?1, updated_at = ?2
         WHERE id = ?3 AND (key_gen_limit = 0 OR keys_generated + ?1 <= key_gen_limit)",
        params![count, now, product_id],
    )?;
    Ok(affected == 1)
}

// ============ Sales ============

pub struct NewSale<'a> {
    pub salesperson_id: i64,
    pub software_id: i64,
    pub key_type_id: i64,
    pub key_count: i64,
    pub sale_amount: f64,
    pub commission_rate: f64,
    pub commission: f64,
    pub details: &'a SaleDetails,
}

pub fn insert_sale(conn: &Connection, sale: &NewSale<'_>, now: i64) -> Result<SalespersonSale> {
    conn.execute(
        "INSERT INTO salesperson_sales (salesperson_id, software_id, key_type_id, key_count,
             sale_amount, commission_rate, commission, status, customer_name, customer_phone,
             customer_email, notes, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, ?9, ?10, ?11, ?12)",
        params![
            sale.salesperson_id,
            sale.software_id,
            sale.key_type_id,
            sale.key_count,
            sale.sale_amount,
            sale.commission_rate,
            sale.commission,
            &sale.details.customer_name,
            &sale.details.customer_phone,
            &sale.details.customer_email,
            &sale.details.notes,
            now,
        ],
    )?;

    Ok(SalespersonSale {
        id: conn.last_insert_rowid(),
        salesperson_id: sale.salesperson_id,
        software_id: sale.software_id,
        key_type_id: sale.key_type_id,
        key_count: sale.key_count,
        sale_amount: sale.sale_amount,
        commission_rate: sale.commission_rate,
        commission: sale.commission,
        status: SettlementStatus::Pending,
        customer_name: sale.details.customer_name.clone(),
        customer_phone: sale.details.customer_phone.clone(),
        customer_email: sale.details.customer_email.clone(),
        notes: sale.details.notes.clone(),
        settled_at: None,
        created_at: now,
    })
}

pub fn get_sale(conn: &Connection, id: i64) -> Result<Option<SalespersonSale>> {
    query_one(
        conn,
        &format!("SELECT {} FROM salesperson_sales WHERE id = ?1", SALE_COLS),
        &[&id],
    )
}

pub fn list_sales(
    conn: &Connection,
    salesperson_id: i64,
    filter: &SaleFilter,
) -> Result<Page<SalespersonSale>> {
    Filter::default()
        .equals("salesperson_id", Some(salesperson_id))
        .equals("status", filter.status.map(|s| s.as_ref().to_string()))
        .since("created_at", filter.start_time)
        .until("created_at", filter.end_time)
        .page(conn, "salesperson_sales", SALE_COLS, filter.page, filter.page_size)
}

pub fn commission_stats(conn: &Connection, salesperson_id: i64) -> Result<CommissionStats> {
    Ok(conn.query_row(
        "SELECT COALESCE(SUM(sale_amount), 0),
                COALESCE(SUM(commission), 0),
                COALESCE(SUM(CASE WHEN status = 'pending' THEN commission END), 0),
                COALESCE(SUM(CASE WHEN status = 'settled' THEN commission END), 0),
                COALESCE(SUM(CASE WHEN status = 'cancelled' THEN commission END), 0)
         FROM salesperson_sales WHERE salesperson_id = ?1",
        params![salesperson_id],
        |row| {
            Ok(CommissionStats {
                total_sales: row.get(0)?,
                total_commission: row.get(1)?,
                pending_amount: row.get(2)?,
                settled_amount: row.get(3)?,
                cancelled_amount: row.get(4)?,
            })
        },
    )?)
}

// ============ Agent commissions ============

pub struct NewAgentCommission {
    pub sale_id: i64,
    pub salesperson_id: i64,
    pub agent_id: i64,
    pub agent_level: i64,
    pub original_amount: f64,
    pub commission_rate: f64,
    pub commission_amount: f64,
}

pub fn insert_agent_commission(
    conn: &Connection,
    row: &NewAgentCommission,
    now: i64,
) -> Result<AgentCommission> {
    conn.execute(
        "INSERT INTO agent_commissions (sale_id, salesperson_id, agent_id, agent_level,
             original_amount, commission_rate, commission_amount, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8)",
        params![
            row.sale_id,
            row.salesperson_id,
            row.agent_id,
            row.agent_level,
            row.original_amount,
            row.commission_rate,
            row.commission_amount,
            now,
        ],
    )?;

    Ok(AgentCommission {
        id: conn.last_insert_rowid(),
        sale_id: row.sale_id,
        salesperson_id: row.salesperson_id,
        agent_id: row.agent_id,
        agent_level: row.agent_level,
        original_amount: row.original_amount,
        commission_rate: row.commission_rate,
        commission_amount: row.commission_amount,
        status: SettlementStatus::Pending,
        settlement_id: None,
        created_at: now,
    })
}

pub fn list_agent_commissions(conn: &Connection, agent_id: i64) -> Result<Vec<AgentCommission>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM agent_commissions WHERE agent_id = ?1 ORDER BY id DESC",
            AGENT_COMMISSION_COLS
        ),
        &[&agent_id],
    )
}

pub fn list_commissions_for_sale(conn: &Connection, sale_id: i64) -> Result<Vec<AgentCommission>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM agent_commissions WHERE sale_id = ?1 ORDER BY id",
            AGENT_COMMISSION_COLS
        ),
        &[&sale_id],
    )
}

// ============ Invitations ============

pub fn insert_invitation(
    conn: &Connection,
    inviter_id: i64,
    invite_code: &str,
    input: &CreateInvitation,
    expires_at: i64,
    now: i64,
) -> rusqlite::Result<AgentInvitation> {
    conn.execute(
        "INSERT INTO agent_invitations (inviter_id, invite_code, email, phone, status,
                                        expired_at, created_at)
         VALUES (?1, ?2, ?3, ?4, 'pending', ?5, ?6)",
        params![inviter_id, invite_code, &input.email, &input.phone, expires_at, now],
    )?;

    Ok(AgentInvitation {
        id: conn.last_insert_rowid(),
        inviter_id,
        invitee_id: None,
        invite_code: invite_code.to_string(),
        email: input.email.clone(),
        phone: input.phone.clone(),
        status: InvitationStatus::Pending,
        accepted_at: None,
        expired_at: expires_at,
        created_at: now,
    })
}

pub fn get_invitation_by_code(conn: &Connection, code: &str) -> Result<Option<AgentInvitation>> {
    query_one(
        conn,
        &format!("SELECT {} FROM agent_invitations WHERE invite_code = ?1", INVITATION_COLS),
        &[&code],
    )
}

/// True if an unexpired pending invitation already targets this email or phone.
pub fn open_invitation_exists(
    conn: &Connection,
    email: Option<&str>,
    phone: Option<&str>,
    now: i64,
) -> Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT id FROM agent_invitations
             WHERE status = 'pending' AND expired_at > ?1
               AND ((?2 IS NOT NULL AND email = ?2) OR (?3 IS NOT NULL AND phone = ?3))
             LIMIT 1",
            params![now, email, phone],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn list_invitations(conn: &Connection, inviter_id: i64) -> Result<Vec<AgentInvitation>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM agent_invitations WHERE inviter_id = ?1 ORDER BY id DESC",
            INVITATION_COLS
        ),
        &[&inviter_id],
    )
}

pub fn set_invitation_status(
    conn: &Connection,
    id: i64,
    status: InvitationStatus,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE agent_invitations SET status = ?1 WHERE id = ?2 AND status = 'pending'",
        params![status.as_ref(), id],
    )?;
    Ok(affected == 1)
}

pub fn mark_invitation_accepted(
    conn: &Connection,
    id: i64,
    invitee_id: i64,
    now: i64,
) -> Result<bool> {
    let affected = conn.execute(
        "UPDATE agent_invitations SET status = 'accepted', invitee_id = ?1, accepted_at = ?2
         WHERE id = ?3 AND status = 'pending'",
        params![invitee_id, now, id],
    )?;
    Ok(affected == 1)
}
