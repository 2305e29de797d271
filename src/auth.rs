//! Credentials: admin bearer token, salesperson session tokens and password hashes.

use argon2::password_hash::SaltString;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use jwt_simple::prelude::{Claims, Duration, HS256Key, MACLike};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};

/// The single shared secret guarding `/admin`.
///
/// Only a SHA-256 digest is held so comparison cost does not depend on the
/// candidate's length.
pub struct AdminToken {
    digest: [u8; 32],
}

impl AdminToken {
    pub fn new(token: &str) -> Self {
        Self {
            digest: Sha256::digest(token.as_bytes()).into(),
        }
    }

    pub fn verify(&self, candidate: &str) -> bool {
        let digest: [u8; 32] = Sha256::digest(candidate.as_bytes()).into();
        digest.ct_eq(&self.digest).into()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalespersonClaims {
    pub salesperson_id: i64,
    pub username: String,
}

/// Issues and verifies HS256 session tokens for salespeople.
pub struct TokenIssuer {
    key: HS256Key,
    ttl_hours: u64,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl_hours: u64) -> Self {
        Self {
            key: HS256Key::from_bytes(secret),
            ttl_hours: ttl_hours.max(1),
        }
    }

    pub fn ttl_hours(&self) -> u64 {
        self.ttl_hours
    }

    pub fn issue(&self, salesperson_id: i64, username: &str) -> Result<String> {
        let claims = Claims::with_custom_claims(
            SalespersonClaims {
                salesperson_id,
                username: username.to_string(),
            },
            Duration::from_hours(self.ttl_hours),
        )
        .with_subject(salesperson_id.to_string());

        self.key
            .authenticate(claims)
            .map_err(|e| AppError::Internal(format!("Failed to sign token: {}", e)))
    }

    pub fn verify(&self, token: &str) -> Result<SalespersonClaims> {
        self.key
            .verify_token::<SalespersonClaims>(token, None)
            .map(|claims| claims.custom)
            .map_err(|_| AppError::Unauthorized("Invalid or expired token".into()))
    }
}

/// Hash a password into a PHC string (argon2id, random salt).
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// False for a wrong password and for a hash that does not parse.
pub fn verify_password(password: &str, phc: &str) -> bool {
    PasswordHash::new(phc)
        .map(|parsed| {
            Argon2::default()
                .verify_password(password.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_token_matches_only_itself() {
        let token = AdminToken::new("s3cret");
        assert!(token.verify("s3cret"));
        assert!(!token.verify("s3cret "));
        assert!(!token.verify(""));
    }

    #[test]
    fn session_token_round_trip() {
        let issuer = TokenIssuer::new(b"test-secret-test-secret-test-sec", 1);
        let token = issuer.issue(42, "alice").unwrap();
        let claims = issuer.verify(&token).unwrap();
        assert_eq!(claims.salesperson_id, 42);
        assert_eq!(claims.username, "alice");

        let other = TokenIssuer::new(b"another-secret-another-secret-an", 1);
        assert!(matches!(other.verify(&token), Err(AppError::Unauthorized(_))));
    }

    #[test]
    fn password_hash_verifies() {
        let phc = hash_password("hunter2").unwrap();
        assert!(phc.starts_with("$argon2id$"));
        assert!(verify_password("hunter2", &phc));
        assert!(!verify_password("hunter3", &phc));
        assert!(!verify_password("hunter2", "not-a-hash"));
    }
}
