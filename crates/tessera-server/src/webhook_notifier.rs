//! Adapts `tessera_webhooks::WebhookDispatcher` onto the core's
//! `WebhookNotifier` port: record a pending delivery row, then hand off to
//! the dispatcher as a detached task so the triggering request never waits
//! on an outbound HTTP call.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use tessera_core::ports::{WebhookDeliveryStore, WebhookNotifier};
use tessera_webhooks::{DeliveryRecorder, WebhookDispatcher, WebhookEvent};

use crate::webhook_recorder::StoreBackedRecorder;

pub struct DispatchingNotifier {
    dispatcher: Arc<WebhookDispatcher>,
    recorder: Arc<StoreBackedRecorder>,
    deliveries: Arc<dyn WebhookDeliveryStore>,
    url: Option<String>,
}

impl DispatchingNotifier {
    pub fn new(
        dispatcher: Arc<WebhookDispatcher>,
        deliveries: Arc<dyn WebhookDeliveryStore>,
        url: Option<String>,
    ) -> Self {
        Self { dispatcher, recorder: Arc::new(StoreBackedRecorder::new(deliveries.clone())), deliveries, url }
    }
}

#[async_trait]
impl WebhookNotifier for DispatchingNotifier {
    async fn notify(&self, event_type: &str, payload: Value) {
        let Some(url) = self.url.clone() else {
            return;
        };
        let delivery = match self.deliveries.create_pending(event_type, payload.clone(), &url).await {
            Ok(delivery) => delivery,
            Err(err) => {
                tracing::warn!(%err, event_type, "failed to record pending webhook delivery");
                return;
            }
        };

        let dispatcher = self.dispatcher.clone();
        let recorder: Arc<dyn DeliveryRecorder> = self.recorder.clone();
        let event = WebhookEvent { event_type: event_type.to_string(), timestamp: chrono::Utc::now(), payload };
        tokio::spawn(async move {
            dispatcher.deliver(event, recorder, Some(delivery.id)).await;
        });
    }
}
