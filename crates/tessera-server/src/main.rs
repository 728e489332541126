//! tessera-server — standalone REST server for Tessera.
//!
//! Reads config from env vars documented in `config::Config::from_env`:
//!   DATABASE_URL — Postgres connection string (required)
//!   BIND_ADDR    — listen address (default: 0.0.0.0:8080)

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;

use tessera_core::ports::{Cache, WebhookDeliveryStore, WebhookNotifier};
use tessera_core::service::{CoreService, CoreServiceImpl};
use tessera_postgres::{build_stores, PgWebhookDeliveryStore, RedisCache};
use tessera_server::config::Config;
use tessera_server::middleware::rate_limit::RateLimiters;
use tessera_server::null_cache::NullCache;
use tessera_server::router::build_router;
use tessera_server::state::AppState;
use tessera_server::webhook_notifier::DispatchingNotifier;
use tessera_webhooks::{SsrfGuardConfig, WebhookConfig, WebhookDispatcher};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tessera_server=debug".into()),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(config = %config.summary(), "starting tessera-server");

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .expect("failed to connect to database");
    tracing::info!("connected to database");

    let cache: Arc<dyn Cache> = match &config.redis_url {
        Some(url) => match RedisCache::connect(url).await {
            Ok(cache) => Arc::new(cache),
            Err(err) => {
                tracing::warn!(%err, "failed to connect to redis, falling back to no-op cache");
                Arc::new(NullCache)
            }
        },
        None => Arc::new(NullCache),
    };

    let webhook_deliveries: Arc<dyn WebhookDeliveryStore> = Arc::new(PgWebhookDeliveryStore::new(pool.clone()));
    let dispatcher = Arc::new(WebhookDispatcher::new(WebhookConfig {
        url: config.webhook_url.clone(),
        secret: config.webhook_secret.clone(),
        ssrf: SsrfGuardConfig {
            require_https: config.environment.is_production(),
            allowed_domains: config.webhook_allowed_domains.clone(),
            dns_timeout: config.webhook_dns_timeout,
        },
    }));
    let webhooks: Arc<dyn WebhookNotifier> =
        Arc::new(DispatchingNotifier::new(dispatcher, webhook_deliveries, config.webhook_url.clone()));

    let stores = build_stores(pool.clone(), cache, webhooks);
    let service: Arc<dyn CoreService> = Arc::new(CoreServiceImpl::new(stores.clone()));
    let limiters = Arc::new(RateLimiters::new(&config.rate_limits));

    let config = Arc::new(config);
    let state = AppState { service, stores: Arc::new(stores), config: config.clone(), db_pool: pool };

    let app = build_router(state, limiters);

    let listener = TcpListener::bind(&config.bind_addr).await.unwrap_or_else(|e| panic!("failed to bind to {}: {e}", config.bind_addr));
    tracing::info!("tessera-server listening on {}", config.bind_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<std::net::SocketAddr>())
        .await
        .expect("server error");
}
