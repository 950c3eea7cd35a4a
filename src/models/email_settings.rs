use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailSettings {
    pub id: Uuid,
    pub smtp_host: String,
    pub smtp_port: i32,
    pub smtp_user: String,
    #[serde(skip_serializing)]
    pub smtp_password_enc: Vec<u8>,
    pub from_address: String,
    pub admin_email: Option<String>,
    /// Read by the site's contact form; stored and served here only.
    pub auto_reply: bool,
    pub tls_mode: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
