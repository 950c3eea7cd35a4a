use std::time::Duration;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use uuid::Uuid;

use super::content::NewsletterPayload;
use crate::config::DispatchConfig;
use crate::db;
use crate::db::deliveries::NewDelivery;
use crate::email::{MailError, Mailer, OutgoingMail, templates};
use crate::models::{ContentKind, DeliveryStatus, DispatchStatus, Subscriber};
use crate::rate_limit::DispatchLimiter;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchReport {
    pub success: bool,
    pub newsletter_id: Option<Uuid>,
    pub status: DispatchStatus,
    pub recipient_count: usize,
    pub sent_count: usize,
    pub failed_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub recipients: Vec<RecipientReport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipientReport {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchReport {
    fn failed(newsletter_id: Option<Uuid>, recipient_count: usize, error: String) -> Self {
        Self {
            success: false,
            newsletter_id,
            status: DispatchStatus::Failed,
            recipient_count,
            sent_count: 0,
            failed_count: recipient_count,
            error: Some(error),
            recipients: Vec::new(),
        }
    }
}

/// One settled send.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub subscriber_id: Uuid,
    pub email: String,
    pub result: Result<String, MailError>,
    pub attempts: u32,
}

/// A rendered mail bound to its recipient.
pub struct PreparedMail {
    pub subscriber_id: Uuid,
    pub mail: OutgoingMail,
}

#[derive(Debug, Clone)]
pub struct FanOut {
    pub concurrency: usize,
    pub max_retries: u32,
    pub backoff: Duration,
}

impl From<&DispatchConfig> for FanOut {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            concurrency: config.max_concurrency.max(1),
            max_retries: config.max_retries,
            backoff: config.retry_backoff,
        }
    }
}

/// Confirmed subscribers whose preferences admit `kind`, in input order.
pub fn select_recipients(subscribers: Vec<Subscriber>, kind: ContentKind) -> Vec<Subscriber> {
    subscribers.into_iter().filter(|s| s.receives(kind)).collect()
}

pub fn unsubscribe_url(app_url: &str, token: &str) -> String {
    format!("{app_url}/newsletter/unsubscribe?token={token}")
}

pub fn preferences_url(app_url: &str, token: &str) -> String {
    format!("{app_url}/newsletter/preferences?token={token}")
}

/// Send a payload to every eligible subscriber. Never fails: errors are
/// folded into a report with `success: false`.
pub async fn dispatch(state: &AppState, payload: &NewsletterPayload) -> DispatchReport {
    match run(state, payload).await {
        Ok(report) => report,
        Err(report) => {
            tracing::error!(
                kind = %payload.kind,
                error = report.error.as_deref().unwrap_or_default(),
                "Newsletter dispatch failed"
            );
            report
        }
    }
}

async fn run(state: &AppState, payload: &NewsletterPayload) -> Result<DispatchReport, DispatchReport> {
    let subscribers = db::subscribers::list_confirmed(&state.pool)
        .await
        .map_err(|e| DispatchReport::failed(None, 0, format!("Failed to load subscribers: {e}")))?;
    let recipients = select_recipients(subscribers, payload.kind);
    let recipient_count = recipients.len();

    let newsletter = db::newsletters::create_pending(
        &state.pool,
        &payload.subject,
        &payload.content,
        payload.kind.as_str(),
        payload.project_id,
        count_i32(recipient_count),
    )
    .await
    .map_err(|e| {
        DispatchReport::failed(None, recipient_count, format!("Failed to record newsletter: {e}"))
    })?;

    if recipients.is_empty() {
        settle(state, newsletter.id, DispatchStatus::Completed, 0, 0, None).await;
        tracing::info!(newsletter_id = %newsletter.id, kind = %payload.kind, "Newsletter had no eligible recipients");
        return Ok(DispatchReport {
            success: true,
            newsletter_id: Some(newsletter.id),
            status: DispatchStatus::Completed,
            recipient_count: 0,
            sent_count: 0,
            failed_count: 0,
            error: None,
            recipients: Vec::new(),
        });
    }

    let mailer = match state.mailer.mailer().await {
        Ok(mailer) => mailer,
        Err(e) => {
            let error = e.to_string();
            let count = count_i32(recipient_count);
            settle(state, newsletter.id, DispatchStatus::Failed, 0, count, Some(&error)).await;
            return Err(DispatchReport::failed(Some(newsletter.id), recipient_count, error));
        }
    };

    if let Some(ttl) = state.config.dispatch.token_ttl {
        let ids: Vec<Uuid> = recipients.iter().map(|s| s.id).collect();
        if let Err(e) = db::subscribers::extend_tokens(&state.pool, &ids, Utc::now() + ttl).await {
            tracing::warn!("Failed to extend subscriber tokens: {e}");
        }
    }

    let app_url = state.config.app_url.as_str();
    let mut outcomes = Vec::with_capacity(recipient_count);
    let mut prepared = Vec::with_capacity(recipient_count);
    for subscriber in &recipients {
        match templates::newsletter(
            &subscriber.email,
            &payload.subject,
            &payload.content,
            &unsubscribe_url(app_url, &subscriber.token),
            &preferences_url(app_url, &subscriber.token),
            app_url,
        ) {
            Ok(mail) => prepared.push(PreparedMail {
                subscriber_id: subscriber.id,
                mail,
            }),
            Err(e) => outcomes.push(Outcome {
                subscriber_id: subscriber.id,
                email: subscriber.email.clone(),
                result: Err(MailError::Build(e.to_string())),
                attempts: 0,
            }),
        }
    }

    let fan_out = FanOut::from(&state.config.dispatch);
    outcomes.extend(deliver_all(&mailer, &state.dispatch_limiter, prepared, &fan_out).await);

    let deliveries: Vec<NewDelivery<'_>> = outcomes.iter().map(to_delivery).collect();
    if let Err(e) = db::deliveries::record_all(&state.pool, newsletter.id, &deliveries).await {
        tracing::error!(newsletter_id = %newsletter.id, "Failed to record deliveries: {e}");
    }

    let sent = outcomes.iter().filter(|o| o.result.is_ok()).count();
    let failed = outcomes.len() - sent;
    let status = DispatchStatus::settle(sent, failed);
    let error = (status == DispatchStatus::Failed).then(|| "Every delivery failed".to_string());

    settle(
        state,
        newsletter.id,
        status,
        count_i32(sent),
        count_i32(failed),
        error.as_deref(),
    )
    .await;

    tracing::info!(
        newsletter_id = %newsletter.id,
        kind = %payload.kind,
        sent,
        failed,
        status = status.as_str(),
        "Newsletter dispatched"
    );

    let report = DispatchReport {
        success: status != DispatchStatus::Failed,
        newsletter_id: Some(newsletter.id),
        status,
        recipient_count,
        sent_count: sent,
        failed_count: failed,
        error,
        recipients: outcomes.iter().map(to_recipient_report).collect(),
    };

    if report.success { Ok(report) } else { Err(report) }
}

/// Send every prepared mail with bounded concurrency under the shared rate
/// limit. Each mail settles independently of the others.
pub async fn deliver_all(
    mailer: &Mailer,
    limiter: &DispatchLimiter,
    prepared: Vec<PreparedMail>,
    fan_out: &FanOut,
) -> Vec<Outcome> {
    stream::iter(prepared)
        .map(|item| async move {
            let (result, attempts) = send_with_retry(mailer, limiter, &item.mail, fan_out).await;
            if let Err(e) = &result {
                tracing::warn!(to = %item.mail.to, attempts, "Newsletter delivery failed: {e}");
            }
            Outcome {
                subscriber_id: item.subscriber_id,
                email: item.mail.to,
                result,
                attempts,
            }
        })
        .buffer_unordered(fan_out.concurrency.max(1))
        .collect()
        .await
}

async fn send_with_retry(
    mailer: &Mailer,
    limiter: &DispatchLimiter,
    mail: &OutgoingMail,
    fan_out: &FanOut,
) -> (Result<String, MailError>, u32) {
    let mut attempt = 0;
    loop {
        attempt += 1;
        limiter.acquire().await;
        match mailer.send(mail).await {
            Ok(message_id) => return (Ok(message_id), attempt),
            Err(e) if e.is_transient() && attempt <= fan_out.max_retries => {
                let delay = fan_out.backoff * 2u32.saturating_pow(attempt - 1);
                tracing::debug!(to = %mail.to, attempt, "Transient send failure, retrying in {delay:?}: {e}");
                tokio::time::sleep(delay).await;
            }
            Err(e) => return (Err(e), attempt),
        }
    }
}

async fn settle(
    state: &AppState,
    newsletter_id: Uuid,
    status: DispatchStatus,
    sent: i32,
    failed: i32,
    error: Option<&str>,
) {
    if let Err(e) =
        db::newsletters::settle(&state.pool, newsletter_id, status, sent, failed, error).await
    {
        tracing::error!(%newsletter_id, "Failed to settle newsletter status: {e}");
    }
}

fn to_delivery(outcome: &Outcome) -> NewDelivery<'_> {
    let (status, message_id, error) = match &outcome.result {
        Ok(id) => (DeliveryStatus::Sent, Some(id.as_str()), None),
        Err(e) => (DeliveryStatus::Failed, None, Some(e.to_string())),
    };
    NewDelivery {
        subscriber_id: outcome.subscriber_id,
        email: &outcome.email,
        status,
        message_id,
        error,
        attempts: i32::try_from(outcome.attempts).unwrap_or(i32::MAX),
    }
}

fn to_recipient_report(outcome: &Outcome) -> RecipientReport {
    RecipientReport {
        email: outcome.email.clone(),
        message_id: outcome.result.as_ref().ok().cloned(),
        error: outcome.result.as_ref().err().map(|e| e.to_string()),
    }
}

fn count_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
