//! No-op `Cache` used when `REDIS_URL` isn't configured. Every call is a
//! miss or no-op, same contract as a real cache backend on an outage.

use async_trait::async_trait;
use serde_json::Value;

use tessera_core::ports::Cache;

pub struct NullCache;

#[async_trait]
impl Cache for NullCache {
    async fn get(&self, _prefix: &str, _key: &str) -> Option<Value> {
        None
    }

    async fn set(&self, _prefix: &str, _key: &str, _value: Value, _ttl_secs: u64) {}

    async fn delete(&self, _prefix: &str, _key: &str) {}

    async fn invalidate_pattern(&self, _prefix: &str, _pattern: &str) {}
}
