use std::sync::Arc;

use async_trait::async_trait;
use lettre::transport::stub::AsyncStubTransport;
use sqlx::PgPool;

use super::{Mailer, MailError, MailerSource, SmtpParams, build_smtp_transport};
use crate::config::Config;
use crate::crypto::SecretCipher;
use crate::db;
use crate::models::EmailSettings;

const ETHEREAL_HOST: &str = "smtp.ethereal.email";
const ETHEREAL_PORT: u16 = 587;

/// Builds a mailer per send from, in order: the stored settings row, the
/// `SMTP_*` environment, and (outside production) the Ethereal test account
/// or a log-only sink.
pub struct SettingsMailerSource {
    pool: PgPool,
    config: Config,
    cipher: SecretCipher,
}

impl SettingsMailerSource {
    pub fn new(pool: PgPool, config: Config, cipher: SecretCipher) -> Self {
        Self { pool, config, cipher }
    }
}

#[async_trait]
impl MailerSource for SettingsMailerSource {
    async fn mailer(&self) -> Result<Arc<Mailer>, MailError> {
        let stored = db::email_settings::find_first(&self.pool)
            .await
            .map_err(|e| MailError::Config(format!("Failed to load email settings: {e}")))?;

        if let Some(settings) = stored {
            return mailer_from_settings(&settings, &self.cipher, &self.config).map(Arc::new);
        }

        fallback_mailer(&self.config).map(Arc::new)
    }
}

/// Mailer for a stored settings row.
pub fn mailer_from_settings(
    settings: &EmailSettings,
    cipher: &SecretCipher,
    config: &Config,
) -> Result<Mailer, MailError> {
    let password = cipher
        .open(&settings.smtp_password_enc)
        .map_err(|e| MailError::Config(format!("Stored SMTP password unreadable: {e}")))?;
    let port = u16::try_from(settings.smtp_port)
        .map_err(|_| MailError::Config(format!("Invalid SMTP port {}", settings.smtp_port)))?;

    let transport = build_smtp_transport(&SmtpParams {
        host: &settings.smtp_host,
        port,
        username: &settings.smtp_user,
        password: &password,
        tls_mode: &settings.tls_mode,
    })?;

    let admin_email = settings
        .admin_email
        .clone()
        .or_else(|| config.mail.admin_email.clone());

    Ok(Mailer::new(Arc::new(transport), &settings.from_address)?.with_admin_email(admin_email))
}

/// Mailer used when no settings row exists.
pub fn fallback_mailer(config: &Config) -> Result<Mailer, MailError> {
    let mail = &config.mail;

    if let Some(smtp) = &mail.smtp {
        let transport = build_smtp_transport(&SmtpParams {
            host: &smtp.host,
            port: smtp.port,
            username: &smtp.user,
            password: &smtp.pass,
            tls_mode: "starttls",
        })?;
        return Ok(Mailer::new(Arc::new(transport), &mail.from)?
            .with_admin_email(mail.admin_email.clone()));
    }

    if config.environment.is_production() {
        return Err(MailError::Config(
            "Email delivery is not configured".to_string(),
        ));
    }

    if let Some(ethereal) = &mail.ethereal {
        tracing::debug!("Using Ethereal test transport");
        let transport = build_smtp_transport(&SmtpParams {
            host: ETHEREAL_HOST,
            port: ETHEREAL_PORT,
            username: &ethereal.user,
            password: &ethereal.pass,
            tls_mode: "starttls",
        })?;
        return Ok(Mailer::new(Arc::new(transport), &mail.from)?
            .with_admin_email(mail.admin_email.clone())
            .with_preview(true));
    }

    tracing::warn!("No SMTP settings found; outgoing mail will only be logged");
    Ok(Mailer::new(Arc::new(AsyncStubTransport::new_ok()), &mail.from)?
        .with_admin_email(mail.admin_email.clone()))
}
