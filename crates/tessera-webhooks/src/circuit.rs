//! Per-process circuit breaker with an attached dead-letter queue. One
//! instance guards the single configured webhook URL; it trips after
//! consecutive failures, fails fast during cooldown, and allows one probe
//! through afterward (half-open) to decide whether to close again.

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::sync::Mutex;

pub const CIRCUIT_BREAKER_THRESHOLD: u32 = 5;
pub const CIRCUIT_BREAKER_COOLDOWN: Duration = Duration::from_secs(60);
pub const DEAD_LETTER_MAX_SIZE: usize = 100;

#[derive(Debug, Clone)]
pub struct QueuedEvent {
    pub event_type: String,
    pub payload: Value,
}

struct Inner {
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    dead_letters: Vec<QueuedEvent>,
}

pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    dead_letter_max: usize,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration, dead_letter_max: usize) -> Self {
        Self {
            threshold,
            cooldown,
            dead_letter_max,
            inner: Mutex::new(Inner {
                consecutive_failures: 0,
                opened_at: None,
                dead_letters: Vec::new(),
            }),
        }
    }

    pub async fn record_success(&self) {
        let mut inner = self.inner.lock().await;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
    }

    pub async fn record_failure(&self) {
        let mut inner = self.inner.lock().await;
        inner.consecutive_failures += 1;
        if inner.consecutive_failures >= self.threshold && inner.opened_at.is_none() {
            inner.opened_at = Some(Instant::now());
            tracing::warn!(
                consecutive_failures = inner.consecutive_failures,
                cooldown_secs = self.cooldown.as_secs(),
                "webhook circuit breaker opened"
            );
        }
    }

    /// True while the circuit should fail fast. Once the cooldown has
    /// elapsed this returns false even without a recorded success, letting
    /// exactly one probe request through (half-open).
    pub async fn is_open(&self) -> bool {
        let inner = self.inner.lock().await;
        match inner.opened_at {
            None => false,
            Some(opened_at) => opened_at.elapsed() < self.cooldown,
        }
    }

    /// Adds a failed event to the dead-letter queue, dropping the oldest
    /// entry first if already at capacity.
    pub async fn enqueue_dead_letter(&self, event: QueuedEvent) {
        let mut inner = self.inner.lock().await;
        if inner.dead_letters.len() >= self.dead_letter_max {
            inner.dead_letters.remove(0);
        }
        inner.dead_letters.push(event);
    }

    /// Drains and returns every queued event, for replay after the circuit
    /// closes again.
    pub async fn drain_dead_letters(&self) -> Vec<QueuedEvent> {
        let mut inner = self.inner.lock().await;
        std::mem::take(&mut inner.dead_letters)
    }

    pub async fn dead_letter_count(&self) -> usize {
        self.inner.lock().await.dead_letters.len()
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CIRCUIT_BREAKER_THRESHOLD, CIRCUIT_BREAKER_COOLDOWN, DEAD_LETTER_MAX_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_failures() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60), 10);
        assert!(!breaker.is_open().await);
        for _ in 0..3 {
            breaker.record_failure().await;
        }
        assert!(breaker.is_open().await);
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new(3, Duration::from_secs(60), 10);
        breaker.record_failure().await;
        breaker.record_failure().await;
        breaker.record_success().await;
        breaker.record_failure().await;
        assert!(!breaker.is_open().await);
    }

    #[tokio::test]
    async fn dead_letter_queue_drops_oldest_when_full() {
        let breaker = CircuitBreaker::new(1, Duration::from_secs(60), 2);
        for i in 0..3 {
            breaker
                .enqueue_dead_letter(QueuedEvent {
                    event_type: format!("event-{i}"),
                    payload: serde_json::Value::Null,
                })
                .await;
        }
        assert_eq!(breaker.dead_letter_count().await, 2);
        let drained = breaker.drain_dead_letters().await;
        assert_eq!(drained[0].event_type, "event-1");
        assert_eq!(drained[1].event_type, "event-2");
        assert_eq!(breaker.dead_letter_count().await, 0);
    }
}
