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
use crate::db::certificates::NewCertificate;
use crate::error::AppError;
use crate::models::Certificate;
use crate::newsletter::content;
use crate::state::SharedState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCertificate {
    pub title: String,
    pub issuer: String,
    pub issue_date: Option<NaiveDate>,
    pub credential_url: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub notify_subscribers: bool,
}

pub async fn list(
    _admin: AdminUser,
    State(state): State<SharedState>,
) -> Result<Json<Vec<Certificate>>, AppError> {
    let certificates = db::certificates::list(&state.pool).await?;
    Ok(Json(certificates))
}

pub async fn create(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Json(req): Json<CreateCertificate>,
) -> Result<(StatusCode, Json<Created<Certificate>>), AppError> {
    let title = req.title.trim();
    let issuer = req.issuer.trim();
    if title.is_empty() || issuer.is_empty() {
        return Err(AppError::BadRequest("Title and issuer are required".to_string()));
    }

    let certificate = db::certificates::create(
        &state.pool,
        &NewCertificate {
            title,
            issuer,
            issue_date: req.issue_date,
            credential_url: req.credential_url.as_deref(),
            image_url: req.image_url.as_deref(),
            description: req.description.as_deref(),
        },
    )
    .await?;

    tracing::info!(certificate_id = %certificate.id, "Certificate created");

    let newsletter = if req.notify_subscribers {
        announce(
            &state,
            content::certificate_newsletter(&certificate, &state.config.app_url),
        )
        .await
    } else {
        None
    };

    Ok((
        StatusCode::CREATED,
        Json(Created {
            record: certificate,
            newsletter,
        }),
    ))
}

pub async fn get(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Certificate>, AppError> {
    let certificate = db::certificates::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Certificate not found".to_string()))?;
    Ok(Json(certificate))
}

pub async fn delete(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !db::certificates::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Certificate not found".to_string()));
    }
    Ok(Json(serde_json::json!({ "message": "Deleted" })))
}
