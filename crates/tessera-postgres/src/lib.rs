//! PostgreSQL adapters for every `tessera-core` port trait, plus a
//! Redis-backed cache. Every query is runtime-checked (`sqlx::query` /
//! `sqlx::query_as`), never the compile-time `query!` macro, so the crate
//! builds without a live database connection.

pub mod apikeys;
pub mod assets;
pub mod audit;
pub mod cache;
pub mod contracts;
pub mod proposals;
pub mod sqlx_types;
pub mod teams;
pub mod webhooks;

pub use apikeys::PgApiKeyStore;
pub use assets::{PgAssetStore, PgDependencyStore};
pub use audit::{PgAuditRunStore, PgAuditStore};
pub use cache::RedisCache;
pub use contracts::{PgContractStore, PgRegistrationStore};
pub use proposals::{PgAcknowledgmentStore, PgObjectionStore, PgProposalStore};
pub use teams::{PgTeamStore, PgUserStore};
pub use webhooks::PgWebhookDeliveryStore;

pub(crate) fn internal(e: sqlx::Error) -> tessera_core::error::TesseraError {
    tessera_core::error::TesseraError::Internal(anyhow::anyhow!(e))
}

/// Builds the full `Stores` bundle from one pool, one cache connection, and
/// one webhook notifier. The notifier comes from the caller rather than
/// being built here, since wiring an actual HTTP dispatcher is
/// `tessera-webhooks`' job and this crate has no dependency on it.
pub fn build_stores(
    pool: sqlx::PgPool,
    cache: std::sync::Arc<dyn tessera_core::ports::Cache>,
    webhooks: std::sync::Arc<dyn tessera_core::ports::WebhookNotifier>,
) -> tessera_core::ports::Stores {
    use std::sync::Arc;
    tessera_core::ports::Stores {
        teams: Arc::new(PgTeamStore::new(pool.clone())),
        users: Arc::new(PgUserStore::new(pool.clone())),
        assets: Arc::new(PgAssetStore::new(pool.clone())),
        dependencies: Arc::new(PgDependencyStore::new(pool.clone())),
        contracts: Arc::new(PgContractStore::new(pool.clone())),
        registrations: Arc::new(PgRegistrationStore::new(pool.clone())),
        proposals: Arc::new(PgProposalStore::new(pool.clone())),
        acknowledgments: Arc::new(PgAcknowledgmentStore::new(pool.clone())),
        objections: Arc::new(PgObjectionStore::new(pool.clone())),
        audit: Arc::new(PgAuditStore::new(pool.clone())),
        audit_runs: Arc::new(PgAuditRunStore::new(pool.clone())),
        webhook_deliveries: Arc::new(PgWebhookDeliveryStore::new(pool.clone())),
        api_keys: Arc::new(PgApiKeyStore::new(pool)),
        cache,
        webhooks,
    }
}
