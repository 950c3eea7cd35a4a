use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use super::Created;
use super::newsletters::announce;
use crate::auth::extractor::AdminUser;
use crate::db;
use crate::db::projects::NewProject;
use crate::error::AppError;
use crate::models::Project;
use crate::newsletter::content;
use crate::state::SharedState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProject {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub technologies: Vec<String>,
    pub image_url: Option<String>,
    pub github_url: Option<String>,
    pub live_url: Option<String>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub notify_subscribers: bool,
}

pub async fn list(
    _admin: AdminUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<Project>>, AppError> {
    let projects = db::projects::list(&state.pool).await?;
    Ok(Json(projects))
}

pub async fn create(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Json(req): Json<CreateProject>,
) -> Result<(StatusCode, Json<Created<Project>>), AppError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title is required".to_string()));
    }
    if req.description.trim().is_empty() {
        return Err(AppError::BadRequest("Description is required".to_string()));
    }

    let technologies: Vec<String> = req
        .technologies
        .iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect();

    let project = db::projects::create(
        &state.pool,
        &NewProject {
            title,
            description: req.description.trim(),
            technologies: &technologies,
            image_url: req.image_url.as_deref(),
            github_url: req.github_url.as_deref(),
            live_url: req.live_url.as_deref(),
            featured: req.featured,
        },
    )
    .await?;

    tracing::info!(project_id = %project.id, "Project created");

    let newsletter = if req.notify_subscribers {
        announce(&state, content::project_newsletter(&project, &state.config.app_url)).await
    } else {
        None
    };

    Ok((
        StatusCode::CREATED,
        Json(Created {
            record: project,
            newsletter,
        }),
    ))
}

pub async fn get(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Project>, AppError> {
    let project = db::projects::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Project not found".to_string()))?;
    Ok(Json(project))
}

pub async fn delete(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !db::projects::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Project not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "message": "Deleted" })))
}
