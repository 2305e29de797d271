#![allow(dead_code)]

use std::sync::Arc;

use rusqlite::Connection;
use tempfile::TempDir;

pub use keyvend::auth::{AdminToken, TokenIssuer};
pub use keyvend::clock::{Clock, FixedClock};
pub use keyvend::codegen::CodeGenerator;
pub use keyvend::db::{AppState, DbPool, create_pool, init_db, queries};
pub use keyvend::error::AppError;
pub use keyvend::hierarchy::{self, HierarchyRules};
pub use keyvend::login_limiter::LoginLimiter;
pub use keyvend::models::*;
pub use keyvend::{catalog, integrity, keys, sales, salespeople};

/// Nov 14 2023, a fixed "now" for every test.
pub const NOW: i64 = 1_700_000_000;
pub const ADMIN_TOKEN: &str = "test-admin-token";
pub const JWT_SECRET: &[u8] = b"test-jwt-secret";
pub const LOGIN_MAX_ATTEMPTS: u32 = 3;

/// File-backed SQLite database that lives as long as the value.
pub struct TestDb {
    _dir: TempDir,
    pub pool: DbPool,
}

pub fn test_db() -> TestDb {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("keyvend.db");
    let pool = create_pool(path.to_str().expect("Non-UTF-8 temp path")).expect("Failed to create pool");
    {
        let conn = pool.get().expect("Failed to get connection");
        init_db(&conn).expect("Failed to initialize schema");
    }
    TestDb { _dir: dir, pool }
}

pub fn test_clock() -> Arc<FixedClock> {
    Arc::new(FixedClock::new(NOW))
}

pub fn test_state(db: &TestDb, clock: Arc<FixedClock>) -> AppState {
    AppState {
        db: db.pool.clone(),
        limiter: Arc::new(LoginLimiter::new(clock.clone(), LOGIN_MAX_ATTEMPTS, 15)),
        clock,
        codes: Arc::new(CodeGenerator::new()),
        tokens: Arc::new(TokenIssuer::new(JWT_SECRET, 24)),
        admin_token: Arc::new(AdminToken::new(ADMIN_TOKEN)),
        rules: HierarchyRules::default(),
    }
}

// ============ Catalog fixtures ============

pub fn create_software(conn: &Connection, clock: &dyn Clock, name: &str) -> Software {
    catalog::create_software(
        conn,
        clock,
        &CreateSoftware {
            name: name.to_string(),
            version: "1.0.0".to_string(),
            announcement: None,
        },
    )
    .expect("Failed to create software")
}

pub fn create_key_type(
    conn: &Connection,
    clock: &dyn Clock,
    name: &str,
    hours: i64,
    price: f64,
) -> KeyType {
    catalog::create_key_type(
        conn,
        clock,
        &CreateKeyType {
            name: name.to_string(),
            description: None,
            hours,
            price,
        },
    )
    .expect("Failed to create key type")
}

/// A software with one bound 720h / 9.99 key type.
pub fn seed_catalog(conn: &Connection, clock: &dyn Clock) -> (Software, KeyType) {
    let software = create_software(conn, clock, "Test App");
    let key_type = create_key_type(conn, clock, "Monthly", 720, 9.99);
    catalog::bind(conn, clock, software.id, key_type.id, 0).expect("Failed to bind");
    (software, key_type)
}

pub fn mint_as_admin(
    conn: &mut Connection,
    clock: &dyn Clock,
    software_id: i64,
    key_type_id: i64,
    count: i64,
) -> Vec<Key> {
    keys::mint(
        conn,
        &CodeGenerator::new(),
        clock,
        &MintKeys {
            software_id,
            key_type_id,
            count,
        },
        keys::Creator::Admin(0),
    )
    .expect("Failed to mint keys")
}

// ============ Salesperson fixtures ============

/// Insert a salesperson without paying for a real password hash.
pub fn create_salesperson(
    conn: &Connection,
    username: &str,
    commission_rate: f64,
    parent_commission_rate: f64,
) -> Salesperson {
    queries::create_salesperson(
        conn,
        &CreateSalesperson {
            username: username.to_string(),
            password: String::new(),
            name: format!("{} name", username),
            phone: None,
            email: None,
            commission_rate,
            parent_commission_rate,
        },
        "not-a-real-hash",
        NOW,
    )
    .expect("Failed to create salesperson")
}

pub fn invite(
    conn: &mut Connection,
    clock: &dyn Clock,
    rules: &HierarchyRules,
    inviter_id: i64,
    email: &str,
) -> AgentInvitation {
    hierarchy::create_invitation(
        conn,
        &CodeGenerator::new(),
        clock,
        rules,
        inviter_id,
        CreateInvitation {
            email: Some(email.to_string()),
            phone: None,
        },
    )
    .expect("Failed to create invitation")
}

/// Put `child` directly under `parent` through the invitation flow.
pub fn link(
    conn: &mut Connection,
    clock: &dyn Clock,
    rules: &HierarchyRules,
    parent_id: i64,
    child_id: i64,
) -> AgentInvitation {
    let invitation = invite(
        conn,
        clock,
        rules,
        parent_id,
        &format!("agent{}@example.com", child_id),
    );
    hierarchy::accept_invitation(conn, clock, rules, &invitation.invite_code, child_id)
        .expect("Failed to accept invitation")
}

pub fn assign(
    conn: &mut Connection,
    clock: &dyn Clock,
    salesperson_id: i64,
    software_id: i64,
    key_type_id: i64,
    commission_rate: f64,
    key_gen_limit: i64,
) -> SalespersonProduct {
    salespeople::assign_product(
        conn,
        clock,
        salesperson_id,
        &AssignProduct {
            software_id,
            key_type_id,
            commission_rate: Some(commission_rate),
            key_gen_limit: Some(key_gen_limit),
        },
    )
    .expect("Failed to assign product")
}

pub fn reload(conn: &Connection, id: i64) -> Salesperson {
    queries::get_salesperson(conn, id)
        .expect("Query failed")
        .expect("Salesperson missing")
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-9,
        "expected {expected}, got {actual}"
    );
}
