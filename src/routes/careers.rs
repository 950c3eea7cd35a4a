use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;

use super::Created;
use super::newsletters::announce;
use crate::auth::extractor::AdminUser;
use crate::db;
use crate::db::careers::NewCareer;
use crate::error::AppError;
use crate::models::Career;
use crate::newsletter::content;
use crate::state::SharedState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCareer {
    pub title: String,
    pub company: String,
    pub location: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_current: bool,
    pub description: String,
    #[serde(default)]
    pub notify_subscribers: bool,
}

pub async fn list(
    _admin: AdminUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<Career>>, AppError> {
    let careers = db::careers::list(&state.pool).await?;
    Ok(Json(careers))
}

pub async fn create(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Json(req): Json<CreateCareer>,
) -> Result<(StatusCode, Json<Created<Career>>), AppError> {
    let title = req.title.trim();
    let company = req.company.trim();
    if title.is_empty() || company.is_empty() {
        return Err(AppError::BadRequest("Title and company are required".to_string()));
    }
    if let Some(end) = req.end_date
        && end < req.start_date
    {
        return Err(AppError::BadRequest("End date must not precede start date".to_string()));
    }

    let career = db::careers::create(
        &state.pool,
        &NewCareer {
            title,
            company,
            location: req.location.as_deref(),
            start_date: req.start_date,
            end_date: if req.is_current { None } else { req.end_date },
            is_current: req.is_current,
            description: req.description.trim(),
        },
    )
    .await?;

    tracing::info!(career_id = %career.id, "Career entry created");

    let newsletter = if req.notify_subscribers {
        announce(&state, content::career_newsletter(&career, &state.config.app_url)).await
    } else {
        None
    };

    Ok((
        StatusCode::CREATED,
        Json(Created {
            record: career,
            newsletter,
        }),
    ))
}

pub async fn get(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Career>, AppError> {
    let career = db::careers::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Career entry not found".to_string()))?;
    Ok(Json(career))
}

pub async fn delete(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !db::careers::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Career entry not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "message": "Deleted" })))
}
