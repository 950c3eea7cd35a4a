use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Project;

pub struct NewProject<'a> {
    pub title: &'a str,
    pub description: &'a str,
    pub technologies: &'a [String],
    pub image_url: Option<&'a str>,
    pub github_url: Option<&'a str>,
    pub live_url: Option<&'a str>,
    pub featured: bool,
}

pub async fn list(pool: &PgPool) -> Result<Vec<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects ORDER BY created_at DESC")
        .fetch_all(pool)
        .await
}

pub async fn create(pool: &PgPool, project: &NewProject<'_>) -> Result<Project, sqlx::Error> {
    sqlx::query_as::<_, Project>(
        "INSERT INTO projects (title, description, technologies, image_url, github_url, live_url, featured)
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING *",
    )
    .bind(project.title)
    .bind(project.description)
    .bind(project.technologies)
    .bind(project.image_url)
    .bind(project.github_url)
    .bind(project.live_url)
    .bind(project.featured)
    .fetch_one(pool)
    .await
}

pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Project>, sqlx::Error> {
    sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
