use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Newsletter {
    pub id: Uuid,
    pub subject: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub project_id: Option<Uuid>,
    pub status: String,
    pub recipient_count: i32,
    pub sent_count: i32,
    pub failed_count: i32,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsletterDelivery {
    pub id: Uuid,
    pub newsletter_id: Uuid,
    pub subscriber_id: Option<Uuid>,
    pub email: String,
    pub status: String,
    pub message_id: Option<String>,
    pub error: Option<String>,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle of one dispatch record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchStatus {
    Pending,
    Completed,
    Partial,
    Failed,
}

impl DispatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DispatchStatus::Pending => "pending",
            DispatchStatus::Completed => "completed",
            DispatchStatus::Partial => "partial",
            DispatchStatus::Failed => "failed",
        }
    }

    /// Final status once every recipient has settled.
    pub fn settle(sent: usize, failed: usize) -> Self {
        match (sent, failed) {
            (_, 0) => DispatchStatus::Completed,
            (0, _) => DispatchStatus::Failed,
            _ => DispatchStatus::Partial,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Sent => "sent",
            DeliveryStatus::Failed => "failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settle_reports_partial_only_for_mixed_outcomes() {
        assert_eq!(DispatchStatus::settle(3, 0), DispatchStatus::Completed);
        assert_eq!(DispatchStatus::settle(0, 0), DispatchStatus::Completed);
        assert_eq!(DispatchStatus::settle(2, 1), DispatchStatus::Partial);
        assert_eq!(DispatchStatus::settle(0, 4), DispatchStatus::Failed);
    }
}
