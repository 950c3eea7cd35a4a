use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::extractor::AdminUser;
use crate::db;
use crate::error::AppError;
use crate::models::Subscriber;
use crate::newsletter::token;
use crate::state::SharedState;

#[derive(Serialize)]
pub struct SubscriberList {
    pub total: usize,
    pub confirmed: usize,
    pub subscribers: Vec<Subscriber>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotatedToken {
    pub message: String,
    pub token_expires_at: Option<DateTime<Utc>>,
}

pub async fn list(
    _admin: AdminUser,
    State(state): State<SharedState>,
) -> Result<Json<SubscriberList>, AppError> {
    let subscribers = db::subscribers::list(&state.pool).await?;
    let confirmed = subscribers.iter().filter(|s| s.is_confirmed).count();

    Ok(Json(SubscriberList {
        total: subscribers.len(),
        confirmed,
        subscribers,
    }))
}

pub async fn delete(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    if !db::subscribers::delete(&state.pool, id).await? {
        return Err(AppError::NotFound("Subscriber not found".to_string()));
    }

    tracing::info!(subscriber_id = %id, "Subscriber removed by admin");
    Ok(Json(serde_json::json!({ "message": "Deleted" })))
}

/// Revoke every outstanding link for a subscriber.
pub async fn rotate_token(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> Result<Json<RotatedToken>, AppError> {
    let subscriber = token::rotate(&state.pool, id, state.config.dispatch.token_ttl).await?;

    tracing::info!(subscriber_id = %id, "Subscriber token rotated");
    Ok(Json(RotatedToken {
        message: "Token rotated".to_string(),
        token_expires_at: subscriber.token_expires_at,
    }))
}
