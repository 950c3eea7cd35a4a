use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Preferences, Subscriber, SubscriberRow};

const SELECT_SUBSCRIBER: &str = "SELECT s.id, s.email, s.token, s.is_confirmed, s.token_issued_at,
        s.token_expires_at, s.confirmed_at, s.created_at,
        p.projects, p.certificates, p.skills, p.careers
     FROM subscribers s
     LEFT JOIN subscriber_preferences p ON p.subscriber_id = s.id";

/// Insert an unconfirmed subscriber together with its preferences row.
pub async fn create(
    pool: &PgPool,
    email: &str,
    token: &str,
    token_expires_at: Option<DateTime<Utc>>,
    preferences: &Preferences,
) -> Result<Subscriber, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let id: Uuid = sqlx::query_scalar(
        "INSERT INTO subscribers (email, token, token_expires_at)
         VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(email)
    .bind(token)
    .bind(token_expires_at)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        "INSERT INTO subscriber_preferences (subscriber_id, projects, certificates, skills, careers)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(id)
    .bind(preferences.projects)
    .bind(preferences.certificates)
    .bind(preferences.skills)
    .bind(preferences.careers)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    find_by_id(pool, id).await?.ok_or(sqlx::Error::RowNotFound)
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Subscriber>, sqlx::Error> {
    let row = sqlx::query_as::<_, SubscriberRow>(&format!("{SELECT_SUBSCRIBER} WHERE s.id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(Subscriber::from))
}

pub async fn find_by_token(pool: &PgPool, token: &str) -> Result<Option<Subscriber>, sqlx::Error> {
    let row =
        sqlx::query_as::<_, SubscriberRow>(&format!("{SELECT_SUBSCRIBER} WHERE s.token = $1"))
            .bind(token)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(Subscriber::from))
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Subscriber>, sqlx::Error> {
    let row =
        sqlx::query_as::<_, SubscriberRow>(&format!("{SELECT_SUBSCRIBER} WHERE s.email = $1"))
            .bind(email)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(Subscriber::from))
}

pub async fn list(pool: &PgPool) -> Result<Vec<Subscriber>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SubscriberRow>(&format!(
        "{SELECT_SUBSCRIBER} ORDER BY s.created_at DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Subscriber::from).collect())
}

/// Confirmed subscribers with whatever preferences they have stored.
pub async fn list_confirmed(pool: &PgPool) -> Result<Vec<Subscriber>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SubscriberRow>(&format!(
        "{SELECT_SUBSCRIBER} WHERE s.is_confirmed = true ORDER BY s.created_at ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(Subscriber::from).collect())
}

/// Mark the subscriber owning `token` confirmed. Returns `None` for unknown tokens.
pub async fn confirm(pool: &PgPool, token: &str) -> Result<Option<Subscriber>, sqlx::Error> {
    let id: Option<Uuid> = sqlx::query_scalar(
        "UPDATE subscribers
         SET is_confirmed = true, confirmed_at = COALESCE(confirmed_at, now())
         WHERE token = $1 RETURNING id",
    )
    .bind(token)
    .fetch_optional(pool)
    .await?;

    match id {
        Some(id) => find_by_id(pool, id).await,
        None => Ok(None),
    }
}

/// Upsert the preferences row of the subscriber owning `token`.
pub async fn update_preferences(
    pool: &PgPool,
    token: &str,
    preferences: &Preferences,
) -> Result<Option<Subscriber>, sqlx::Error> {
    let id: Option<Uuid> = sqlx::query_scalar(
        "INSERT INTO subscriber_preferences (subscriber_id, projects, certificates, skills, careers)
         SELECT id, $2, $3, $4, $5 FROM subscribers WHERE token = $1
         ON CONFLICT (subscriber_id) DO UPDATE SET
           projects = EXCLUDED.projects,
           certificates = EXCLUDED.certificates,
           skills = EXCLUDED.skills,
           careers = EXCLUDED.careers
         RETURNING subscriber_id",
    )
    .bind(token)
    .bind(preferences.projects)
    .bind(preferences.certificates)
    .bind(preferences.skills)
    .bind(preferences.careers)
    .fetch_optional(pool)
    .await?;

    match id {
        Some(id) => find_by_id(pool, id).await,
        None => Ok(None),
    }
}

/// Hard-delete by token. Returns whether a row was removed.
pub async fn delete_by_token(pool: &PgPool, token: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM subscribers WHERE token = $1")
        .bind(token)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM subscribers WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Replace the token, which revokes every link carrying the old one.
pub async fn rotate_token(
    pool: &PgPool,
    id: Uuid,
    token: &str,
    token_expires_at: Option<DateTime<Utc>>,
) -> Result<Option<Subscriber>, sqlx::Error> {
    let updated: Option<Uuid> = sqlx::query_scalar(
        "UPDATE subscribers
         SET token = $2, token_issued_at = now(), token_expires_at = $3
         WHERE id = $1 RETURNING id",
    )
    .bind(id)
    .bind(token)
    .bind(token_expires_at)
    .fetch_optional(pool)
    .await?;

    match updated {
        Some(id) => find_by_id(pool, id).await,
        None => Ok(None),
    }
}

/// Push token expiry forward for recipients of a fresh mailing.
pub async fn extend_tokens(
    pool: &PgPool,
    ids: &[Uuid],
    token_expires_at: DateTime<Utc>,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "UPDATE subscribers SET token_expires_at = GREATEST(token_expires_at, $2)
         WHERE id = ANY($1)",
    )
    .bind(ids)
    .bind(token_expires_at)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

pub async fn count_confirmed(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM subscribers WHERE is_confirmed = true")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}
