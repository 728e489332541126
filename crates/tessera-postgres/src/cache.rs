//! Redis-backed `Cache` port implementation. Every method degrades to a
//! miss or no-op on any Redis error instead of propagating it: a cache
//! outage should never turn into a request failure.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::Value;

use tessera_core::ports::Cache;

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        Ok(Self { conn })
    }

    fn namespaced(prefix: &str, key: &str) -> String {
        format!("tessera:{prefix}:{key}")
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, prefix: &str, key: &str) -> Option<Value> {
        let mut conn = self.conn.clone();
        let namespaced = Self::namespaced(prefix, key);
        match conn.get::<_, Option<String>>(&namespaced).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).ok(),
            Ok(None) => None,
            Err(e) => {
                tracing::debug!(error = %e, key = %namespaced, "cache get failed, treating as miss");
                None
            }
        }
    }

    async fn set(&self, prefix: &str, key: &str, value: Value, ttl_secs: u64) {
        let mut conn = self.conn.clone();
        let namespaced = Self::namespaced(prefix, key);
        let Ok(raw) = serde_json::to_string(&value) else {
            return;
        };
        if let Err(e) = conn.set_ex::<_, _, ()>(&namespaced, raw, ttl_secs).await {
            tracing::debug!(error = %e, key = %namespaced, "cache set failed, ignoring");
        }
    }

    async fn delete(&self, prefix: &str, key: &str) {
        let mut conn = self.conn.clone();
        let namespaced = Self::namespaced(prefix, key);
        if let Err(e) = conn.del::<_, ()>(&namespaced).await {
            tracing::debug!(error = %e, key = %namespaced, "cache delete failed, ignoring");
        }
    }

    async fn invalidate_pattern(&self, prefix: &str, pattern: &str) {
        let mut conn = self.conn.clone();
        let namespaced_pattern = Self::namespaced(prefix, pattern);
        let keys: Vec<String> = match conn.keys(&namespaced_pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::debug!(error = %e, pattern = %namespaced_pattern, "cache scan failed, ignoring");
                return;
            }
        };
        if keys.is_empty() {
            return;
        }
        if let Err(e) = conn.del::<_, ()>(keys).await {
            tracing::debug!(error = %e, pattern = %namespaced_pattern, "cache bulk delete failed, ignoring");
        }
    }
}
