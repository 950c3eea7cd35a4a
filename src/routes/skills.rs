use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use uuid::Uuid;

use super::Created;
use super::newsletters::announce;
use crate::auth::extractor::AdminUser;
use crate::db;
use crate::error::AppError;
use crate::models::Skill;
use crate::newsletter::content;
use crate::state::SharedState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSkill {
    pub name: String,
    pub category: String,
    pub level: i32,
    pub description: Option<String>,
    #[serde(default)]
    pub notify_subscribers: bool,
}

pub async fn list(
    _admin: AdminUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<Skill>>, AppError> {
    let skills = db::skills::list(&state.pool).await?;
    Ok(Json(skills))
}

pub async fn create(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Json(req): Json<CreateSkill>,
) -> Result<(StatusCode, Json<Created<Skill>>), AppError> {
    let name = req.name.trim();
    let category = req.category.trim();
    if name.is_empty() || category.is_empty() {
        return Err(AppError::BadRequest("Name and category are required".to_string()));
    }
    if !(0..=100).contains(&req.level) {
        return Err(AppError::BadRequest("Level must be between 0 and 100".to_string()));
    }

    let skill =
        db::skills::create(&state.pool, name, category, req.level, req.description.as_deref())
            .await?;

    tracing::info!(skill_id = %skill.id, "Skill created");

    let newsletter = if req.notify_subscribers {
        announce(&state, content::skill_newsletter(&skill, &state.config.app_url)).await
    } else {
        None
    };

    Ok((
        StatusCode::CREATED,
        Json(Created {
            record: skill,
            newsletter,
        }),
    ))
}

pub async fn get(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Skill>, AppError> {
    let skill = db::skills::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Skill not found".to_string()))?;
    Ok(Json(skill))
}

pub async fn delete(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !db::skills::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Skill not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "message": "Deleted" })))
}
