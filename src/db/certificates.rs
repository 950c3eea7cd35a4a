use chrono::NaiveDate;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Certificate;

pub struct NewCertificate<'a> {
    pub title: &'a str,
    pub issuer: &'a str,
    pub issue_date: Option<NaiveDate>,
    pub credential_url: Option<&'a str>,
    pub image_url: Option<&'a str>,
    pub description: Option<&'a str>,
}

pub async fn list(pool: &PgPool) -> Result<Vec<Certificate>, sqlx::Error> {
    sqlx::query_as::<_, Certificate>(
        "SELECT * FROM certificates ORDER BY issue_date DESC NULLS LAST, created_at DESC",
    )
    .fetch_all(pool)
    .await
}

pub async fn create(
    pool: &PgPool,
    certificate: &NewCertificate<'_>,
) -> Result<Certificate, sqlx::Error> {
    sqlx::query_as::<_, Certificate>(
        "INSERT INTO certificates (title, issuer, issue_date, credential_url, image_url, description)
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(certificate.title)
    .bind(certificate.issuer)
    .bind(certificate.issue_date)
    .bind(certificate.credential_url)
    .bind(certificate.image_url)
    .bind(certificate.description)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Certificate>, sqlx::Error> {
    sqlx::query_as::<_, Certificate>("SELECT * FROM certificates WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM certificates WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
