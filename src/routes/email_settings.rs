use axum::Json;
use axum::extract::State;
use lettre::message::Mailbox;
use serde::Deserialize;

use crate::auth::extractor::AdminUser;
use crate::db;
use crate::db::email_settings::SettingsInput;
use crate::email::OutgoingMail;
use crate::email::templates::html_to_text;
use crate::error::AppError;
use crate::state::SharedState;

const TLS_MODES: [&str; 3] = ["starttls", "tls", "none"];

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsRequest {
    pub smtp_host: String,
    pub smtp_port: i32,
    pub smtp_user: String,
    pub smtp_password: String,
    pub from_address: String,
    pub admin_email: Option<String>,
    #[serde(default)]
    pub auto_reply: bool,
    pub tls_mode: Option<String>,
}

#[derive(Deserialize)]
pub struct TestRequest {
    pub to: String,
}

pub async fn get(
    _admin: AdminUser,
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, AppError> {
    let settings = db::email_settings::find_first(&state.pool).await?;

    match settings {
        Some(s) => Ok(Json(serde_json::json!({
            "configured": true,
            "settings": s,
        }))),
        None => Ok(Json(serde_json::json!({ "configured": false }))),
    }
}

pub async fn update(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Json(req): Json<SettingsRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tls_mode = req.tls_mode.as_deref().unwrap_or("starttls");
    validate(&req, tls_mode)?;

    let password_enc = state
        .cipher
        .seal(&req.smtp_password)
        .map_err(AppError::Internal)?;

    let admin_email = req
        .admin_email
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty());

    db::email_settings::upsert(
        &state.pool,
        &SettingsInput {
            smtp_host: req.smtp_host.trim(),
            smtp_port: req.smtp_port,
            smtp_user: &req.smtp_user,
            smtp_password_enc: &password_enc,
            from_address: req.from_address.trim(),
            admin_email,
            auto_reply: req.auto_reply,
            tls_mode,
        },
    )
    .await?;

    tracing::info!(host = %req.smtp_host, "Email settings updated");
    Ok(Json(serde_json::json!({ "message": "Email settings saved" })))
}

pub async fn delete(
    _admin: AdminUser,
    State(state): State<SharedState>,
) -> Result<Json<serde_json::Value>, AppError> {
    db::email_settings::delete(&state.pool).await?;

    tracing::info!("Email settings removed");
    Ok(Json(serde_json::json!({ "message": "Email settings removed" })))
}

/// Send a test message through whichever transport is currently in effect.
pub async fn test(
    _admin: AdminUser,
    State(state): State<SharedState>,
    Json(req): Json<TestRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let to = req.to.trim();
    to.parse::<Mailbox>()
        .map_err(|e| AppError::BadRequest(format!("Invalid to address: {e}")))?;

    let html = "<p>This is a test email from your portfolio. \
                Your email configuration is working!</p>"
        .to_string();
    let mail = OutgoingMail {
        to: to.to_string(),
        subject: "Portfolio email test".to_string(),
        text: html_to_text(&html),
        html,
    };

    let mailer = state.mailer.mailer().await?;
    let message_id = mailer
        .send(&mail)
        .await
        .map_err(|e| AppError::BadRequest(format!("Email test failed: {e}")))?;

    Ok(Json(serde_json::json!({
        "message": "Test email sent successfully",
        "messageId": message_id,
    })))
}

fn validate(req: &SettingsRequest, tls_mode: &str) -> Result<(), AppError> {
    if req.smtp_host.trim().is_empty() {
        return Err(AppError::BadRequest("SMTP host is required".to_string()));
    }
    if !(1..=65535).contains(&req.smtp_port) {
        return Err(AppError::BadRequest("SMTP port must be between 1 and 65535".to_string()));
    }
    if !TLS_MODES.contains(&tls_mode) {
        return Err(AppError::BadRequest(
            "TLS mode must be one of starttls, tls, none".to_string(),
        ));
    }
    req.from_address
        .trim()
        .parse::<Mailbox>()
        .map_err(|e| AppError::BadRequest(format!("Invalid from address: {e}")))?;
    if let Some(admin) = req.admin_email.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        admin
            .parse::<Mailbox>()
            .map_err(|e| AppError::BadRequest(format!("Invalid admin email: {e}")))?;
    }
    Ok(())
}
