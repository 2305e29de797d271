use std::env;
use std::str::FromStr;

const DEV_ADMIN_TOKEN: &str = "dev-admin-token";
const DEV_JWT_SECRET: &str = "dev-jwt-secret-change-me-in-production";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: String,
    pub admin_token: String,
    pub jwt_secret: String,
    /// Lifetime of salesperson session tokens
    pub token_ttl_hours: u64,
    /// Deepest level a salesperson may sit at (root = 0)
    pub max_agent_level: i64,
    pub invitation_ttl_days: i64,
    pub login_max_attempts: u32,
    pub login_lock_minutes: i64,
    /// How often the login limiter evicts stale entries
    pub login_sweep_minutes: u64,
    pub dev_mode: bool,
}

fn parsed<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Read configuration from the environment (and `.env` if present).
    ///
    /// Outside dev mode `ADMIN_TOKEN` and `JWT_SECRET` must be set.
    pub fn from_env() -> Result<Self, String> {
        dotenvy::dotenv().ok();

        let dev_mode = env::var("KEYVEND_ENV")
            .map(|v| v == "dev" || v == "development")
            .unwrap_or(false);

        let secret = |name: &str, dev_default: &str| -> Result<String, String> {
            match env::var(name) {
                Ok(v) if !v.is_empty() => Ok(v),
                _ if dev_mode => Ok(dev_default.to_string()),
                _ => Err(format!("{} must be set outside dev mode", name)),
            }
        };

        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parsed("PORT", 3000),
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "keyvend.db".to_string()),
            admin_token: secret("ADMIN_TOKEN", DEV_ADMIN_TOKEN)?,
            jwt_secret: secret("JWT_SECRET", DEV_JWT_SECRET)?,
            token_ttl_hours: parsed("TOKEN_TTL_HOURS", 24),
            max_agent_level: parsed("MAX_AGENT_LEVEL", 5),
            invitation_ttl_days: parsed("INVITATION_TTL_DAYS", 7),
            login_max_attempts: parsed("LOGIN_MAX_ATTEMPTS", 5),
            login_lock_minutes: parsed("LOGIN_LOCK_MINUTES", 15),
            login_sweep_minutes: parsed("LOGIN_SWEEP_MINUTES", 60),
            dev_mode,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
