//! Shared JWT validation.
//!
//! Tokens are issued by the auth layer (out of scope here) and signed with
//! a single HS256 secret. Services call [`initialize_hmac_secret`] once at
//! startup, then treat the validated `sub` claim as the authenticated
//! principal. No algorithm fallbacks: validation is pinned to HS256.

use anyhow::{anyhow, Result};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, TokenData, Validation};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

const JWT_ALGORITHM: Algorithm = Algorithm::HS256;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user id as UUID string).
    pub sub: String,
    /// Expiration time (unix timestamp).
    pub exp: i64,
    /// Issued at (unix timestamp).
    pub iat: i64,
}

/// The shared secret, set once at startup.
///
/// Stored as the raw secret rather than prebuilt keys so re-initialization
/// with the same value (common in test binaries) is a no-op instead of an
/// error.
static JWT_SECRET: OnceCell<String> = OnceCell::new();

pub fn initialize_hmac_secret(secret: &str) -> Result<()> {
    if secret.is_empty() {
        return Err(anyhow!("JWT secret must not be empty"));
    }
    match JWT_SECRET.get() {
        None => {
            JWT_SECRET
                .set(secret.to_string())
                .map_err(|_| anyhow!("JWT secret already initialized"))?;
            Ok(())
        }
        Some(existing) if existing == secret => Ok(()),
        Some(_) => Err(anyhow!("JWT secret already initialized with a different value")),
    }
}

fn secret() -> Result<&'static str> {
    JWT_SECRET
        .get()
        .map(|s| s.as_str())
        .ok_or_else(|| anyhow!("JWT secret not initialized; call initialize_hmac_secret at startup"))
}

pub fn validate_token(token: &str) -> Result<TokenData<Claims>> {
    let key = DecodingKey::from_secret(secret()?.as_bytes());
    let validation = Validation::new(JWT_ALGORITHM);
    decode::<Claims>(token, &key, &validation).map_err(|e| anyhow!("invalid token: {e}"))
}

/// Issue a token for the given user. The service itself never issues
/// tokens in production (the auth layer owns that); this exists for
/// tooling and tests that need a valid principal.
pub fn generate_token(user_id: Uuid, ttl: Duration) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: (now + ttl).timestamp(),
        iat: now.timestamp(),
    };
    let key = EncodingKey::from_secret(secret()?.as_bytes());
    encode(&Header::new(JWT_ALGORITHM), &claims, &key).map_err(|e| anyhow!("sign token: {e}"))
}
