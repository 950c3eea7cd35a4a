use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Skill;

pub async fn list(pool: &PgPool) -> Result<Vec<Skill>, sqlx::Error> {
    sqlx::query_as::<_, Skill>("SELECT * FROM skills ORDER BY category ASC, level DESC")
        .fetch_all(pool)
        .await
}

pub async fn create(
    pool: &PgPool,
    name: &str,
    category: &str,
    level: i32,
    description: Option<&str>,
) -> Result<Skill, sqlx::Error> {
    sqlx::query_as::<_, Skill>(
        "INSERT INTO skills (name, category, level, description)
         VALUES ($1, $2, $3, $4) RETURNING *",
    )
    .bind(name)
    .bind(category)
    .bind(level)
    .bind(description)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Skill>, sqlx::Error> {
    sqlx::query_as::<_, Skill>("SELECT * FROM skills WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM skills WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
