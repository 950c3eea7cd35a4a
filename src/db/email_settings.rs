use sqlx::PgPool;

use crate::models::EmailSettings;

pub struct SettingsInput<'a> {
    pub smtp_host: &'a str,
    pub smtp_port: i32,
    pub smtp_user: &'a str,
    pub smtp_password_enc: &'a [u8],
    pub from_address: &'a str,
    pub admin_email: Option<&'a str>,
    pub auto_reply: bool,
    pub tls_mode: &'a str,
}

/// The single settings row, if one was saved.
pub async fn find_first(pool: &PgPool) -> Result<Option<EmailSettings>, sqlx::Error> {
    sqlx::query_as::<_, EmailSettings>(
        "SELECT * FROM email_settings ORDER BY created_at ASC LIMIT 1",
    )
    .fetch_optional(pool)
    .await
}

/// Replace the stored settings; at most one row is kept.
pub async fn upsert(pool: &PgPool, input: &SettingsInput<'_>) -> Result<EmailSettings, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM email_settings").execute(&mut *tx).await?;

    let settings = sqlx::query_as::<_, EmailSettings>(
        "INSERT INTO email_settings
            (smtp_host, smtp_port, smtp_user, smtp_password_enc, from_address, admin_email, auto_reply, tls_mode)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING *",
    )
    .bind(input.smtp_host)
    .bind(input.smtp_port)
    .bind(input.smtp_user)
    .bind(input.smtp_password_enc)
    .bind(input.from_address)
    .bind(input.admin_email)
    .bind(input.auto_reply)
    .bind(input.tls_mode)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(settings)
}

pub async fn delete(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM email_settings").execute(pool).await?;
    Ok(())
}
