use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Skill {
    pub id: Uuid,
    pub name: String,
    pub category: String,
    /// Proficiency, 0-100.
    pub level: i32,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}
