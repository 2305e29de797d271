mod from_row;
pub mod queries;
mod schema;

pub use from_row::*;
pub use schema::init_db;

use std::sync::Arc;
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{Connection, Transaction, TransactionBehavior};

use crate::auth::{AdminToken, TokenIssuer};
use crate::clock::{Clock, SystemClock};
use crate::codegen::CodeGenerator;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::hierarchy::HierarchyRules;
use crate::login_limiter::LoginLimiter;

pub type DbPool = Pool<SqliteConnectionManager>;

const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub clock: Arc<dyn Clock>,
    pub codes: Arc<CodeGenerator>,
    pub limiter: Arc<LoginLimiter>,
    pub tokens: Arc<TokenIssuer>,
    pub admin_token: Arc<AdminToken>,
    pub rules: HierarchyRules,
}

impl AppState {
    pub fn from_config(db: DbPool, config: &Config) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            db,
            limiter: Arc::new(LoginLimiter::new(
                clock.clone(),
                config.login_max_attempts,
                config.login_lock_minutes,
            )),
            clock,
            codes: Arc::new(CodeGenerator::new()),
            tokens: Arc::new(TokenIssuer::new(config.jwt_secret.as_bytes(), config.token_ttl_hours)),
            admin_token: Arc::new(AdminToken::new(&config.admin_token)),
            rules: HierarchyRules::new(config.max_agent_level, config.invitation_ttl_days),
        }
    }
}

/// Per-connection setup run by the pool.
pub fn configure_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", true)?;
    conn.busy_timeout(BUSY_TIMEOUT)
}

pub fn create_pool(path: &str) -> std::result::Result<DbPool, r2d2::Error> {
    let manager = SqliteConnectionManager::file(path).with_init(configure_connection);
    Pool::builder().build(manager)
}

/// Run `f` inside an IMMEDIATE transaction.
///
/// Commits when `f` returns `Ok`. On `Err` the transaction is dropped, which
/// rolls back every write made through `tx`. Failing to begin or commit is
/// reported as [`AppError::TransientStore`].
pub fn atomically<T>(
    conn: &mut Connection,
    f: impl FnOnce(&Transaction<'_>) -> Result<T>,
) -> Result<T> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|e| AppError::TransientStore(format!("begin: {}", e)))?;
    let value = f(&tx)?;
    tx.commit()
        .map_err(|e| AppError::TransientStore(format!("commit: {}", e)))?;
    Ok(value)
}
