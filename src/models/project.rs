use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub technologies: Vec<String>,
    pub image_url: Option<String>,
    pub github_url: Option<String>,
    pub live_url: Option<String>,
    pub featured: bool,
    pub created_at: DateTime<Utc>,
}
