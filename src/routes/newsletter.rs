use std::net::SocketAddr;
use std::sync::LazyLock;

use axum::Json;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Redirect;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::client_ip;
use crate::db;
use crate::email::templates;
use crate::error::AppError;
use crate::models::{Preferences, PreferencesUpdate, Subscriber};
use crate::newsletter::token;
use crate::state::{AppState, SharedState};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

const CHECK_INBOX: &str = "Please check your inbox to confirm your subscription";

#[derive(Deserialize)]
pub struct SubscribeRequest {
    pub email: String,
    #[serde(default)]
    pub preferences: PreferencesUpdate,
}

#[derive(Deserialize)]
pub struct TokenQuery {
    pub token: Option<String>,
}

#[derive(Deserialize)]
pub struct TokenRequest {
    pub token: Option<String>,
}

#[derive(Deserialize)]
pub struct PreferencesRequest {
    pub token: Option<String>,
    #[serde(default)]
    pub preferences: PreferencesUpdate,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub email: String,
    pub is_confirmed: bool,
    pub preferences: Preferences,
}

#[derive(Serialize)]
pub struct PreferencesResponse {
    pub message: String,
    pub preferences: Preferences,
}

pub async fn subscribe(
    State(state): State<SharedState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(req): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let ip = client_ip::resolve(&headers, Some(addr.ip()), &state.config.trusted_proxies);
    if let Err(retry_after) = state.subscribe_limiter.check(ip) {
        return Err(AppError::RateLimited(format!(
            "Too many subscription attempts. Retry after {retry_after}s"
        )));
    }

    let email = normalize_email(&req.email)?;

    match db::subscribers::find_by_email(&state.pool, &email).await? {
        Some(existing) if existing.is_confirmed => Err(AppError::Conflict(
            "This email is already subscribed".to_string(),
        )),
        Some(mut existing) => {
            // An expired link would be resent dead
            if !existing.token_is_fresh(Utc::now()) {
                existing = token::rotate(&state.pool, existing.id, state.config.dispatch.token_ttl).await?;
            }
            let preferences = existing.effective_preferences().apply(&req.preferences);
            db::subscribers::update_preferences(&state.pool, &existing.token, &preferences).await?;
            send_confirmation(&state, &existing).await?;

            tracing::info!(subscriber_id = %existing.id, "Confirmation resent to pending subscriber");
            Ok((
                StatusCode::OK,
                Json(serde_json::json!({ "message": CHECK_INBOX })),
            ))
        }
        None => {
            let preferences = Preferences::default().apply(&req.preferences);
            let new_token = token::generate();
            let expires_at = token::expiry(Utc::now(), state.config.dispatch.token_ttl);

            let subscriber =
                db::subscribers::create(&state.pool, &email, &new_token, expires_at, &preferences)
                    .await
                    .map_err(|e| match e {
                        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                            AppError::Conflict("This email is already subscribed".to_string())
                        }
                        _ => AppError::Database(e),
                    })?;

            send_confirmation(&state, &subscriber).await?;

            tracing::info!(subscriber_id = %subscriber.id, "New subscriber pending confirmation");
            Ok((
                StatusCode::CREATED,
                Json(serde_json::json!({ "message": CHECK_INBOX })),
            ))
        }
    }
}

/// Link target in the confirmation email; lands the browser on the site.
pub async fn confirm_link(
    State(state): State<SharedState>,
    Query(query): Query<TokenQuery>,
) -> Redirect {
    let app_url = &state.config.app_url;
    match confirm_subscriber(&state, query.token.as_deref()).await {
        Ok(_) => Redirect::to(&format!("{app_url}/newsletter/confirmed")),
        Err(e) => {
            tracing::debug!("Confirmation link rejected: {e}");
            Redirect::to(&format!("{app_url}/newsletter/invalid"))
        }
    }
}

pub async fn confirm(
    State(state): State<SharedState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    confirm_subscriber(&state, query.token.as_deref()).await?;
    Ok(Json(serde_json::json!({ "message": "Subscription confirmed" })))
}

pub async fn verify(
    State(state): State<SharedState>,
    Query(query): Query<TokenQuery>,
) -> Result<Json<VerifyResponse>, AppError> {
    let subscriber = token::authorize(&state.pool, query.token.as_deref(), Utc::now()).await?;

    Ok(Json(VerifyResponse {
        preferences: subscriber.effective_preferences(),
        email: subscriber.email,
        is_confirmed: subscriber.is_confirmed,
    }))
}

pub async fn update_preferences(
    State(state): State<SharedState>,
    Json(req): Json<PreferencesRequest>,
) -> Result<Json<PreferencesResponse>, AppError> {
    let subscriber = token::authorize(&state.pool, req.token.as_deref(), Utc::now()).await?;
    let preferences = subscriber.effective_preferences().apply(&req.preferences);

    db::subscribers::update_preferences(&state.pool, &subscriber.token, &preferences)
        .await?
        .ok_or_else(|| AppError::NotFound("Invalid or expired link".to_string()))?;

    tracing::info!(subscriber_id = %subscriber.id, "Subscriber preferences updated");
    Ok(Json(PreferencesResponse {
        message: "Preferences updated".to_string(),
        preferences,
    }))
}

pub async fn unsubscribe(
    State(state): State<SharedState>,
    Json(req): Json<TokenRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let subscriber = token::authorize(&state.pool, req.token.as_deref(), Utc::now()).await?;

    if !db::subscribers::delete_by_token(&state.pool, &subscriber.token).await? {
        return Err(AppError::NotFound("Invalid or expired link".to_string()));
    }

    tracing::info!(subscriber_id = %subscriber.id, "Subscriber unsubscribed");
    Ok(Json(serde_json::json!({ "message": "You have been unsubscribed" })))
}

async fn confirm_subscriber(state: &AppState, token: Option<&str>) -> Result<Subscriber, AppError> {
    let subscriber = token::authorize(&state.pool, token, Utc::now()).await?;
    if subscriber.is_confirmed {
        return Ok(subscriber);
    }

    let confirmed = db::subscribers::confirm(&state.pool, &subscriber.token)
        .await?
        .ok_or_else(|| AppError::NotFound("Invalid or expired link".to_string()))?;

    tracing::info!(subscriber_id = %confirmed.id, "Subscriber confirmed");
    notify_admin(state, &confirmed).await;
    Ok(confirmed)
}

async fn send_confirmation(state: &AppState, subscriber: &Subscriber) -> Result<(), AppError> {
    let app_url = &state.config.app_url;
    let confirm_url = format!("{app_url}/api/newsletter/confirm?token={}", subscriber.token);
    let mail = templates::confirmation(&subscriber.email, &confirm_url, app_url)?;

    let mailer = state.mailer.mailer().await?;
    mailer.send(&mail).await.map_err(|e| {
        tracing::error!(subscriber_id = %subscriber.id, "Failed to send confirmation: {e}");
        AppError::Internal(format!("Failed to send confirmation email: {e}"))
    })?;
    Ok(())
}

/// Best effort: a failed notice never fails the confirmation.
async fn notify_admin(state: &AppState, subscriber: &Subscriber) {
    let mailer = match state.mailer.mailer().await {
        Ok(mailer) => mailer,
        Err(e) => {
            tracing::warn!("Admin notification skipped: {e}");
            return;
        }
    };
    let Some(admin) = mailer.admin_email() else {
        return;
    };

    let confirmed_count = match db::subscribers::count_confirmed(&state.pool).await {
        Ok(count) => count,
        Err(e) => {
            tracing::warn!("Admin notification skipped, could not count subscribers: {e}");
            return;
        }
    };
    let result = match templates::admin_new_subscriber(admin, &subscriber.email, confirmed_count) {
        Ok(mail) => mailer.send(&mail).await.map(|_| ()).map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };
    if let Err(e) = result {
        tracing::warn!("Failed to notify admin of new subscriber: {e}");
    }
}

fn normalize_email(raw: &str) -> Result<String, AppError> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() || email.len() > 254 || !EMAIL_RE.is_match(&email) {
        return Err(AppError::BadRequest("A valid email address is required".to_string()));
    }
    Ok(email)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ada@Example.COM ").unwrap(), "ada@example.com");
    }

    #[test]
    fn malformed_emails_are_rejected() {
        for raw in ["", "plain", "a@b", "a b@example.com", "@example.com"] {
            assert!(normalize_email(raw).is_err(), "{raw} should be rejected");
        }
        let long = format!("{}@example.com", "a".repeat(250));
        assert!(normalize_email(&long).is_err());
    }
}
