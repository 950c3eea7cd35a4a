use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Career;

pub struct NewCareer<'a> {
    pub title: &'a str,
    pub company: &'a str,
    pub location: Option<&'a str>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    pub is_current: bool,
    pub description: &'a str,
}

pub async fn list(pool: &PgPool) -> Result<Vec<Career>, sqlx::Error> {
    sqlx::query_as::<_, Career>("SELECT * FROM careers ORDER BY start_date DESC")
        .fetch_all(pool)
        .await
}

pub async fn create(pool: &PgPool, career: &NewCareer<'_>) -> Result<Career, sqlx::Error> {
    sqlx::query_as::<_, Career>(
        "INSERT INTO careers (title, company, location, start_date, end_date, is_current, description)
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(career.title)
    .bind(career.company)
    .bind(career.location)
    .bind(career.start_date)
    .bind(career.end_date)
    .bind(career.is_current)
    .bind(career.description)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Career>, sqlx::Error> {
    sqlx::query_as::<_, Career>("SELECT * FROM careers WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM careers WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
