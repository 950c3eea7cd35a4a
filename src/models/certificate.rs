use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub id: Uuid,
    pub title: String,
    pub issuer: String,
    pub issue_date: Option<NaiveDate>,
    pub credential_url: Option<String>,
    pub image_url: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}
