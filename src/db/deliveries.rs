use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{DeliveryStatus, NewsletterDelivery};

pub struct NewDelivery<'a> {
    pub subscriber_id: Uuid,
    pub email: &'a str,
    pub status: DeliveryStatus,
    pub message_id: Option<&'a str>,
    pub error: Option<String>,
    pub attempts: i32,
}

/// Persist every recipient outcome of one dispatch in a single transaction.
pub async fn record_all(
    pool: &PgPool,
    newsletter_id: Uuid,
    deliveries: &[NewDelivery<'_>],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    for delivery in deliveries {
        sqlx::query(
            "INSERT INTO newsletter_deliveries
                (newsletter_id, subscriber_id, email, status, message_id, error, attempts)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(newsletter_id)
        .bind(delivery.subscriber_id)
        .bind(delivery.email)
        .bind(delivery.status.as_str())
        .bind(delivery.message_id)
        .bind(delivery.error.as_deref())
        .bind(delivery.attempts)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

pub async fn list_by_newsletter(
    pool: &PgPool,
    newsletter_id: Uuid,
) -> Result<Vec<NewsletterDelivery>, sqlx::Error> {
    sqlx::query_as::<_, NewsletterDelivery>(
        "SELECT * FROM newsletter_deliveries WHERE newsletter_id = $1 ORDER BY email ASC",
    )
    .bind(newsletter_id)
    .fetch_all(pool)
    .await
}
