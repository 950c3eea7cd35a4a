use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::extractor::AdminUser;
use crate::db;
use crate::error::AppError;
use crate::models::{ContentKind, Newsletter, NewsletterDelivery};
use crate::newsletter::{DispatchReport, NewsletterPayload, content, dispatch};
use crate::state::{AppState, SharedState};

const MAX_SUBJECT_LEN: usize = 200;

#[derive(Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Serialize)]
pub struct NewsletterDetail {
    pub newsletter: Newsletter,
    pub deliveries: Vec<NewsletterDelivery>,
}

pub async fn list(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Newsletter>>, AppError> {
    let limit = query.limit.unwrap_or(50).clamp(1, 200);
    let offset = query.offset.unwrap_or(0).max(0);
    let newsletters = db::newsletters::list(&state.pool, limit, offset).await?;
    Ok(Json(newsletters))
}

pub async fn get(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<NewsletterDetail>, AppError> {
    let newsletter = db::newsletters::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Newsletter not found".to_string()))?;
    let deliveries = db::deliveries::list_by_newsletter(&state.pool, id).await?;

    Ok(Json(NewsletterDetail {
        newsletter,
        deliveries,
    }))
}

/// Send a hand-written newsletter.
pub async fn send(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Json(payload): Json<NewsletterPayload>,
) -> Result<(StatusCode, Json<DispatchReport>), AppError> {
    validate_payload(&payload)?;

    if let Some(project_id) = payload.project_id {
        db::projects::find_by_id(&state.pool, project_id)
            .await?
            .ok_or_else(|| AppError::BadRequest("Referenced project does not exist".to_string()))?;
    }

    let report = dispatch(&state, &payload).await;
    Ok(report_response(report))
}

/// Render the newsletter a content record would produce, without sending.
pub async fn preview(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<Json<NewsletterPayload>, AppError> {
    let kind = parse_kind(&kind)?;
    let payload = content::generate(&state.pool, &state.config.app_url, kind, id).await?;
    Ok(Json(payload))
}

/// Generate and send the newsletter for an existing content record.
pub async fn notify(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path((kind, id)): Path<(String, Uuid)>,
) -> Result<(StatusCode, Json<DispatchReport>), AppError> {
    let kind = parse_kind(&kind)?;
    let payload = content::generate(&state.pool, &state.config.app_url, kind, id).await?;
    let report = dispatch(&state, &payload).await;
    Ok(report_response(report))
}

/// Dispatch an already rendered payload on behalf of a content handler.
pub async fn announce(
    state: &AppState,
    payload: Result<NewsletterPayload, AppError>,
) -> Option<DispatchReport> {
    match payload {
        Ok(payload) => Some(dispatch(state, &payload).await),
        Err(e) => {
            tracing::error!("Failed to render newsletter: {e}");
            None
        }
    }
}

/// A dispatch where nothing was delivered surfaces as a server error.
pub fn report_response(report: DispatchReport) -> (StatusCode, Json<DispatchReport>) {
    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(report))
}

fn parse_kind(raw: &str) -> Result<ContentKind, AppError> {
    raw.parse::<ContentKind>().map_err(AppError::BadRequest)
}

fn validate_payload(payload: &NewsletterPayload) -> Result<(), AppError> {
    let subject = payload.subject.trim();
    if subject.is_empty() || subject.chars().count() > MAX_SUBJECT_LEN {
        return Err(AppError::BadRequest(format!(
            "Subject must be between 1 and {MAX_SUBJECT_LEN} characters"
        )));
    }
    if payload.content.trim().is_empty() {
        return Err(AppError::BadRequest("Content is required".to_string()));
    }
    Ok(())
}
