use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::models::Subscriber;

const MAX_TOKEN_LEN: usize = 128;

/// A fresh unguessable token: 32 random bytes, hex encoded.
pub fn generate() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

pub fn expiry(issued_at: DateTime<Utc>, ttl: Option<Duration>) -> Option<DateTime<Utc>> {
    ttl.map(|ttl| issued_at + ttl)
}

/// Cheap shape check before touching the database.
pub fn is_well_formed(token: &str) -> bool {
    !token.is_empty()
        && token.len() <= MAX_TOKEN_LEN
        && token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Resolve a presented token to its subscriber, rejecting unknown and expired tokens.
pub async fn authorize(
    pool: &PgPool,
    token: Option<&str>,
    now: DateTime<Utc>,
) -> Result<Subscriber, AppError> {
    let token = token
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("Token is required".to_string()))?;

    if !is_well_formed(token) {
        return Err(invalid_link());
    }

    let subscriber = db::subscribers::find_by_token(pool, token)
        .await?
        .ok_or_else(invalid_link)?;

    if !subscriber.token_is_fresh(now) {
        return Err(AppError::Gone("This link has expired".to_string()));
    }

    Ok(subscriber)
}

/// Issue a new token for `id`, revoking every link built with the old one.
pub async fn rotate(pool: &PgPool, id: Uuid, ttl: Option<Duration>) -> Result<Subscriber, AppError> {
    let token = generate();
    db::subscribers::rotate_token(pool, id, &token, expiry(Utc::now(), ttl))
        .await?
        .ok_or_else(|| AppError::NotFound("Subscriber not found".to_string()))
}

fn invalid_link() -> AppError {
    AppError::NotFound("Invalid or expired link".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_tokens_are_unique_hex() {
        let a = generate();
        let b = generate();
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
        assert!(is_well_formed(&a));
    }

    #[test]
    fn malformed_tokens_are_rejected_early() {
        assert!(!is_well_formed(""));
        assert!(!is_well_formed("abc def"));
        assert!(!is_well_formed("abc';--"));
        assert!(!is_well_formed(&"a".repeat(MAX_TOKEN_LEN + 1)));
    }

    #[test]
    fn expiry_only_with_ttl() {
        let now = Utc::now();
        assert_eq!(expiry(now, None), None);
        assert_eq!(expiry(now, Some(Duration::days(30))), Some(now + Duration::days(30)));
    }
}
