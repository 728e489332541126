//! Delivery orchestration: SSRF validation, HMAC signing, bounded
//! concurrency, retry with backoff, and circuit-breaker fail-fast, wired
//! together into one `WebhookDispatcher`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::circuit::{CircuitBreaker, QueuedEvent};
use crate::signer::signature_header;
use crate::ssrf::{validate_webhook_url, SsrfGuardConfig};

pub const MAX_RETRIES: usize = 3;
pub const RETRY_DELAYS_SECS: [u64; MAX_RETRIES] = [1, 5, 30];
pub const MAX_CONCURRENT_WEBHOOKS: usize = 10;

/// Narrow persistence seam: the dispatcher needs to record delivery
/// outcomes but has no other dependency on the application's store.
#[async_trait]
pub trait DeliveryRecorder: Send + Sync {
    async fn record_attempt(&self, delivery_id: Uuid);
    async fn record_delivered(&self, delivery_id: Uuid);
    async fn record_failed(&self, delivery_id: Uuid, error: &str, status_code: Option<u16>);
}

#[derive(Debug, Clone, Serialize)]
pub struct WebhookEvent {
    pub event_type: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub payload: Value,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub url: Option<String>,
    pub secret: Option<String>,
    pub ssrf: SsrfGuardConfig,
}

#[derive(Clone)]
pub struct WebhookDispatcher {
    config: WebhookConfig,
    client: reqwest::Client,
    semaphore: Arc<Semaphore>,
    circuit_breaker: Arc<CircuitBreaker>,
}

impl WebhookDispatcher {
    pub fn new(config: WebhookConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .redirect(reqwest::redirect::Policy::none())
                .build()
                .expect("reqwest client configuration is static and always valid"),
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_WEBHOOKS)),
            circuit_breaker: Arc::new(CircuitBreaker::default()),
        }
    }

    /// Delivers `event`, retrying with the standard 1s/5s/30s backoff.
    /// Returns `true` only if an attempt received a non-error HTTP status.
    /// When no webhook URL is configured, this is a no-op success: there is
    /// nothing to deliver to.
    pub async fn deliver(
        &self,
        event: WebhookEvent,
        recorder: Arc<dyn DeliveryRecorder>,
        delivery_id: Option<Uuid>,
    ) -> bool {
        let Some(url) = self.config.url.clone() else {
            tracing::debug!("no webhook URL configured, skipping delivery");
            return true;
        };

        if self.circuit_breaker.is_open().await {
            tracing::warn!(event_type = %event.event_type, "circuit breaker open, queueing event");
            self.circuit_breaker
                .enqueue_dead_letter(QueuedEvent {
                    event_type: event.event_type.clone(),
                    payload: event.payload.clone(),
                })
                .await;
            if let Some(id) = delivery_id {
                recorder
                    .record_failed(id, "circuit breaker open: endpoint has been consistently failing", None)
                    .await;
            }
            return false;
        }

        let payload = match serde_json::to_string(&event) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize webhook payload");
                return false;
            }
        };

        let _permit = self.semaphore.acquire().await.expect("semaphore is never closed");

        for (attempt, delay_secs) in RETRY_DELAYS_SECS.into_iter().enumerate() {
            if let Some(id) = delivery_id {
                recorder.record_attempt(id).await;
            }

            if let Err(reason) = validate_webhook_url(&url, &self.config.ssrf).await {
                tracing::error!(%reason, "webhook URL validation failed");
                if let Some(id) = delivery_id {
                    recorder.record_failed(id, &format!("URL validation failed: {reason}"), None).await;
                }
                return false;
            }

            let mut request = self.client.post(&url).body(payload.clone());
            request = request.header("Content-Type", "application/json");
            request = request.header("X-Tessera-Event", &event.event_type);
            request = request.header("X-Tessera-Timestamp", event.timestamp.to_rfc3339());
            if let Some(secret) = &self.config.secret {
                request = request.header("X-Tessera-Signature", signature_header(&payload, secret));
            }

            match request.send().await {
                Ok(response) if response.status().as_u16() < 300 => {
                    self.circuit_breaker.record_success().await;
                    if let Some(id) = delivery_id {
                        recorder.record_delivered(id).await;
                    }
                    let drained = self.circuit_breaker.drain_dead_letters().await;
                    self.replay_dead_letters(recorder.clone(), drained);
                    return true;
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    tracing::warn!(attempt, status, "webhook delivery received non-success status");
                    if attempt == MAX_RETRIES - 1 {
                        self.circuit_breaker.record_failure().await;
                        if let Some(id) = delivery_id {
                            recorder
                                .record_failed(id, &format!("HTTP {status}"), Some(status))
                                .await;
                        }
                        return false;
                    }
                }
                Err(e) => {
                    tracing::warn!(attempt, error = %e, "webhook delivery attempt failed");
                    if attempt == MAX_RETRIES - 1 {
                        self.circuit_breaker.record_failure().await;
                        if let Some(id) = delivery_id {
                            recorder.record_failed(id, &e.to_string(), None).await;
                        }
                        return false;
                    }
                }
            }

            tokio::time::sleep(Duration::from_secs(delay_secs)).await;
        }
        false
    }

    /// Re-schedules every drained dead-letter event as its own detached
    /// task so draining the queue never delays the delivery that triggered
    /// it — the success path above still holds its own semaphore permit
    /// at the point this is called.
    fn replay_dead_letters(&self, recorder: Arc<dyn DeliveryRecorder>, drained: Vec<QueuedEvent>) {
        if drained.is_empty() {
            return;
        }
        tracing::info!(count = drained.len(), "replaying dead-lettered webhook events");
        for queued in drained {
            let event = WebhookEvent {
                event_type: queued.event_type,
                timestamp: chrono::Utc::now(),
                payload: queued.payload,
            };
            let dispatcher = self.clone();
            let recorder = recorder.clone();
            tokio::spawn(async move {
                dispatcher.deliver(event, recorder, None).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NullRecorder {
        delivered: AtomicUsize,
    }

    #[async_trait]
    impl DeliveryRecorder for NullRecorder {
        async fn record_attempt(&self, _delivery_id: Uuid) {}
        async fn record_delivered(&self, _delivery_id: Uuid) {
            self.delivered.fetch_add(1, Ordering::SeqCst);
        }
        async fn record_failed(&self, _delivery_id: Uuid, _error: &str, _status_code: Option<u16>) {}
    }

    #[tokio::test]
    async fn no_url_configured_is_a_no_op_success() {
        let dispatcher = WebhookDispatcher::new(WebhookConfig {
            url: None,
            secret: None,
            ssrf: SsrfGuardConfig::default(),
        });
        let recorder = Arc::new(NullRecorder { delivered: AtomicUsize::new(0) });
        let event = WebhookEvent {
            event_type: "contract.published".to_string(),
            timestamp: chrono::Utc::now(),
            payload: serde_json::json!({}),
        };
        assert!(dispatcher.deliver(event, recorder.clone(), None).await);
        assert_eq!(recorder.delivered.load(Ordering::SeqCst), 0);
    }
}
