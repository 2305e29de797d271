use rusqlite::Connection;

use crate::error::Result;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS software (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    version TEXT NOT NULL,
    announcement TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS key_types (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    hours INTEGER NOT NULL CHECK (hours > 0),
    price REAL NOT NULL CHECK (price >= 0),
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS software_key_types (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    software_id INTEGER NOT NULL REFERENCES software(id) ON DELETE CASCADE,
    key_type_id INTEGER NOT NULL REFERENCES key_types(id) ON DELETE CASCADE,
    is_active INTEGER NOT NULL DEFAULT 1,
    creator_id INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    UNIQUE (software_id, key_type_id)
);

CREATE TABLE IF NOT EXISTS salespeople (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    name TEXT NOT NULL,
    phone TEXT,
    email TEXT,
    status TEXT NOT NULL DEFAULT 'active'
        CHECK (status IN ('active', 'inactive', 'suspended')),
    commission_rate REAL NOT NULL DEFAULT 0,
    total_sales REAL NOT NULL DEFAULT 0,
    total_commission REAL NOT NULL DEFAULT 0,
    parent_id INTEGER REFERENCES salespeople(id),
    level INTEGER NOT NULL DEFAULT 0,
    children_count INTEGER NOT NULL DEFAULT 0,
    agent_code TEXT UNIQUE,
    parent_commission_rate REAL NOT NULL DEFAULT 0.1,
    last_login_at INTEGER,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_salespeople_parent ON salespeople(parent_id);

CREATE TABLE IF NOT EXISTS keys (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    code TEXT NOT NULL UNIQUE,
    key_code TEXT NOT NULL UNIQUE,
    key_type_id INTEGER NOT NULL REFERENCES key_types(id),
    type_name TEXT NOT NULL,
    hours INTEGER NOT NULL,
    price REAL NOT NULL,
    software_id INTEGER NOT NULL REFERENCES software(id),
    software_name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'unused' CHECK (status IN ('unused', 'used', 'void')),
    creator_id INTEGER NOT NULL,
    creator_type TEXT NOT NULL CHECK (creator_type IN ('admin', 'salesperson')),
    salesperson_id INTEGER,
    activator_id INTEGER,
    device_info TEXT,
    used_at INTEGER,
    activated_at INTEGER,
    expired_at INTEGER,
    is_blacklisted INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_keys_software ON keys(software_id);
CREATE INDEX IF NOT EXISTS idx_keys_key_type ON keys(key_type_id);
CREATE INDEX IF NOT EXISTS idx_keys_salesperson ON keys(salesperson_id);
CREATE INDEX IF NOT EXISTS idx_keys_status ON keys(status);
CREATE INDEX IF NOT EXISTS idx_keys_created ON keys(created_at);

CREATE TABLE IF NOT EXISTS salesperson_products (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    salesperson_id INTEGER NOT NULL REFERENCES salespeople(id) ON DELETE CASCADE,
    software_id INTEGER NOT NULL REFERENCES software(id) ON DELETE CASCADE,
    key_type_id INTEGER NOT NULL REFERENCES key_types(id) ON DELETE CASCADE,
    commission_rate REAL NOT NULL DEFAULT 0,
    key_gen_limit INTEGER NOT NULL DEFAULT 0,
    keys_generated INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE (salesperson_id, software_id, key_type_id),
    CHECK (key_gen_limit = 0 OR keys_generated <= key_gen_limit)
);

CREATE TABLE IF NOT EXISTS salesperson_sales (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    salesperson_id INTEGER NOT NULL,
    software_id INTEGER NOT NULL,
    key_type_id INTEGER NOT NULL,
    key_count INTEGER NOT NULL,
    sale_amount REAL NOT NULL,
    commission_rate REAL NOT NULL,
    commission REAL NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'settled', 'cancelled')),
    customer_name TEXT,
    customer_phone TEXT,
    customer_email TEXT,
    notes TEXT,
    settled_at INTEGER,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_sales_salesperson ON salesperson_sales(salesperson_id);

CREATE TABLE IF NOT EXISTS agent_commissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    sale_id INTEGER NOT NULL REFERENCES salesperson_sales(id),
    salesperson_id INTEGER NOT NULL,
    agent_id INTEGER NOT NULL,
    agent_level INTEGER NOT NULL,
    original_amount REAL NOT NULL,
    commission_rate REAL NOT NULL,
    commission_amount REAL NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'settled', 'cancelled')),
    settlement_id INTEGER,
    created_at INTEGER NOT NULL,
    UNIQUE (sale_id, agent_id)
);
CREATE INDEX IF NOT EXISTS idx_agent_commissions_agent ON agent_commissions(agent_id);

CREATE TABLE IF NOT EXISTS agent_invitations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    inviter_id INTEGER NOT NULL REFERENCES salespeople(id) ON DELETE CASCADE,
    invitee_id INTEGER,
    invite_code TEXT NOT NULL UNIQUE,
    email TEXT,
    phone TEXT,
    status TEXT NOT NULL DEFAULT 'pending'
        CHECK (status IN ('pending', 'accepted', 'rejected', 'expired')),
    accepted_at INTEGER,
    expired_at INTEGER NOT NULL,
    created_at INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_invitations_inviter ON agent_invitations(inviter_id);
"#;

/// Create every table and index. Safe to run repeatedly.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
