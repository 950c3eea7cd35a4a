use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ContentKind;

/// Per-category opt-in flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub projects: bool,
    pub certificates: bool,
    pub skills: bool,
    pub careers: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            projects: true,
            certificates: true,
            skills: true,
            careers: true,
        }
    }
}

impl Preferences {
    pub fn allows(&self, kind: ContentKind) -> bool {
        match kind {
            ContentKind::Project => self.projects,
            ContentKind::Certificate => self.certificates,
            ContentKind::Skill => self.skills,
            ContentKind::Career => self.careers,
        }
    }

    /// Overlay the flags present in `update`.
    pub fn apply(self, update: &PreferencesUpdate) -> Self {
        Self {
            projects: update.projects.unwrap_or(self.projects),
            certificates: update.certificates.unwrap_or(self.certificates),
            skills: update.skills.unwrap_or(self.skills),
            careers: update.careers.unwrap_or(self.careers),
        }
    }
}

/// Partial preferences as sent by clients; missing flags keep their value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PreferencesUpdate {
    pub projects: Option<bool>,
    pub certificates: Option<bool>,
    pub skills: Option<bool>,
    pub careers: Option<bool>,
}

/// Subscriber joined with its (optional) preferences row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriberRow {
    pub id: Uuid,
    pub email: String,
    pub token: String,
    pub is_confirmed: bool,
    pub token_issued_at: DateTime<Utc>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub projects: Option<bool>,
    pub certificates: Option<bool>,
    pub skills: Option<bool>,
    pub careers: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub token: String,
    pub is_confirmed: bool,
    pub token_issued_at: DateTime<Utc>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// `None` when no preferences row exists.
    pub preferences: Option<Preferences>,
}

impl From<SubscriberRow> for Subscriber {
    fn from(row: SubscriberRow) -> Self {
        let preferences = match (row.projects, row.certificates, row.skills, row.careers) {
            (Some(projects), Some(certificates), Some(skills), Some(careers)) => {
                Some(Preferences {
                    projects,
                    certificates,
                    skills,
                    careers,
                })
            }
            _ => None,
        };

        Subscriber {
            id: row.id,
            email: row.email,
            token: row.token,
            is_confirmed: row.is_confirmed,
            token_issued_at: row.token_issued_at,
            token_expires_at: row.token_expires_at,
            confirmed_at: row.confirmed_at,
            created_at: row.created_at,
            preferences,
        }
    }
}

impl Subscriber {
    /// Preferences in effect; a missing row opts into everything.
    pub fn effective_preferences(&self) -> Preferences {
        self.preferences.unwrap_or_default()
    }

    pub fn receives(&self, kind: ContentKind) -> bool {
        self.is_confirmed && self.effective_preferences().allows(kind)
    }

    pub fn token_is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.token_expires_at.is_none_or(|expires| expires > now)
    }
}
