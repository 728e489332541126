//! Bridges the webhook pipeline's narrow `DeliveryRecorder` seam onto the
//! persisted `WebhookDeliveryStore`, so `tessera-webhooks` stays unaware of
//! how (or whether) outcomes are stored.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use tessera_core::ports::WebhookDeliveryStore;
use tessera_webhooks::DeliveryRecorder;

pub struct StoreBackedRecorder {
    store: Arc<dyn WebhookDeliveryStore>,
}

impl StoreBackedRecorder {
    pub fn new(store: Arc<dyn WebhookDeliveryStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl DeliveryRecorder for StoreBackedRecorder {
    async fn record_attempt(&self, delivery_id: Uuid) {
        if let Err(err) = self.store.record_attempt(delivery_id).await {
            tracing::warn!(%delivery_id, error = %err, "failed to record webhook delivery attempt");
        }
    }

    async fn record_delivered(&self, delivery_id: Uuid) {
        if let Err(err) = self.store.mark_delivered(delivery_id).await {
            tracing::warn!(%delivery_id, error = %err, "failed to record webhook delivery success");
        }
    }

    async fn record_failed(&self, delivery_id: Uuid, error: &str, status_code: Option<u16>) {
        if let Err(err) = self
            .store
            .mark_failed(delivery_id, error, status_code.map(|c| c as i32))
            .await
        {
            tracing::warn!(%delivery_id, error = %err, "failed to record webhook delivery failure");
        }
    }
}
