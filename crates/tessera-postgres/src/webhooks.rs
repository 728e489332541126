use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use tessera_core::error::Result;
use tessera_core::ports::WebhookDeliveryStore;
use tessera_core::types::WebhookDelivery;

use crate::internal;
use crate::sqlx_types::WebhookDeliveryRow;

/// Persists every webhook delivery attempt. Separate from
/// `tessera-webhooks`, whose `WebhookDispatcher` talks to this store only
/// through the narrow `DeliveryRecorder` trait — see the server crate's
/// adapter that bridges the two.
pub struct PgWebhookDeliveryStore {
    pool: PgPool,
}

impl PgWebhookDeliveryStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const DELIVERY_COLUMNS: &str = "id, event_type, payload, url, status::text AS status, attempts, last_attempt_at, last_error, last_status_code, delivered_at, created_at";

#[async_trait]
impl WebhookDeliveryStore for PgWebhookDeliveryStore {
    async fn create_pending(&self, event_type: &str, payload: serde_json::Value, url: &str) -> Result<WebhookDelivery> {
        let query = format!(
            r#"INSERT INTO core.webhook_deliveries (id, event_type, payload, url, status, attempts, created_at)
               VALUES ($1, $2, $3, $4, 'pending', 0, now())
               RETURNING {DELIVERY_COLUMNS}"#
        );
        let row: WebhookDeliveryRow = sqlx::query_as(&query)
            .bind(Uuid::new_v4())
            .bind(event_type)
            .bind(payload)
            .bind(url)
            .fetch_one(&self.pool)
            .await
            .map_err(internal)?;
        row.try_into().map_err(tessera_core::error::TesseraError::Internal)
    }

    async fn mark_delivered(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE core.webhook_deliveries SET status = 'delivered', delivered_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, last_error: &str, last_status_code: Option<i32>) -> Result<()> {
        sqlx::query(
            "UPDATE core.webhook_deliveries SET status = 'failed', last_error = $2, last_status_code = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(last_error)
        .bind(last_status_code)
        .execute(&self.pool)
        .await
        .map_err(internal)?;
        Ok(())
    }

    async fn record_attempt(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE core.webhook_deliveries SET attempts = attempts + 1, last_attempt_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(internal)?;
        Ok(())
    }
}
