use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{DispatchStatus, Newsletter};

/// Record a dispatch before any mail leaves; status starts as `pending`.
pub async fn create_pending(
    pool: &PgPool,
    subject: &str,
    content: &str,
    kind: &str,
    project_id: Option<Uuid>,
    recipient_count: i32,
) -> Result<Newsletter, sqlx::Error> {
    sqlx::query_as::<_, Newsletter>(
        "INSERT INTO newsletters (subject, content, kind, project_id, status, recipient_count)
         VALUES ($1, $2, $3, $4, 'pending', $5) RETURNING *",
    )
    .bind(subject)
    .bind(content)
    .bind(kind)
    .bind(project_id)
    .bind(recipient_count)
    .fetch_one(pool)
    .await
}

pub async fn settle(
    pool: &PgPool,
    id: Uuid,
    status: DispatchStatus,
    sent_count: i32,
    failed_count: i32,
    error: Option<&str>,
) -> Result<Newsletter, sqlx::Error> {
    sqlx::query_as::<_, Newsletter>(
        "UPDATE newsletters
         SET status = $2, sent_count = $3, failed_count = $4, error = $5, completed_at = now()
         WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(status.as_str())
    .bind(sent_count)
    .bind(failed_count)
    .bind(error)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Newsletter>, sqlx::Error> {
    sqlx::query_as::<_, Newsletter>("SELECT * FROM newsletters WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn list(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<Newsletter>, sqlx::Error> {
    sqlx::query_as::<_, Newsletter>(
        "SELECT * FROM newsletters ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
}
