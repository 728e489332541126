//! Router construction: groups routes by rate-limit tier, layers auth on
//! the protected half, and merges in the handful of public routes.

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::{middleware as axum_mw, Extension, Router};

use crate::handlers;
use crate::middleware::rate_limit::{self, RateLimiters, Tier};
use crate::middleware::{auth_middleware, request_id_middleware, security_headers};
use crate::state::AppState;

fn tiered(router: Router, limiters: Arc<RateLimiters>, tier: Tier) -> Router {
    router.layer(axum_mw::from_fn(rate_limit::layer(limiters, tier)))
}

/// Builds the full axum router. `state` is injected as the outermost
/// extension layer so every other middleware (auth, rate limiting) can
/// read it back out of request extensions.
pub fn build_router(state: AppState, limiters: Arc<RateLimiters>) -> Router {
    let read_routes = Router::new()
        .route("/teams", get(handlers::teams::list))
        .route("/teams/:id", get(handlers::teams::get))
        .route("/assets", get(handlers::assets::list))
        .route("/assets/:id", get(handlers::assets::get))
        .route("/assets/:id/contracts", get(handlers::contracts::list_for_asset))
        .route("/assets/:id/lineage", get(handlers::assets::lineage))
        .route("/assets/:id/audit-history", get(handlers::audit::history))
        .route("/contracts/:id", get(handlers::contracts::get))
        .route("/contracts/:id/registrations", get(handlers::contracts::registrations_for_contract))
        .route("/registrations/:id", get(handlers::registrations::get))
        .route("/proposals", get(handlers::proposals::list))
        .route("/proposals/:id", get(handlers::proposals::get))
        .route("/proposals/:id/status", get(handlers::proposals::status))
        .route("/search", get(handlers::search::search));
    let read_routes = tiered(read_routes, limiters.clone(), Tier::Read);

    let expensive_routes = Router::new().route("/assets/:id/impact", post(handlers::assets::impact));
    let expensive_routes = tiered(expensive_routes, limiters.clone(), Tier::Expensive);
    let expensive_routes = tiered(expensive_routes, limiters.clone(), Tier::Read);

    let write_routes = Router::new()
        .route("/teams", post(handlers::teams::create))
        .route("/teams/:id", patch(handlers::teams::update))
        .route("/assets", post(handlers::assets::create))
        .route("/assets/:id", patch(handlers::assets::update).delete(handlers::assets::delete))
        .route("/assets/:id/contracts", post(handlers::contracts::publish))
        .route("/contracts/bulk", post(handlers::contracts::publish_bulk))
        .route("/assets/:id/audit-results", post(handlers::audit::report))
        .route("/assets/:id/proposals", post(handlers::proposals::create))
        .route("/registrations", post(handlers::registrations::create))
        .route("/registrations/:id", patch(handlers::registrations::update).delete(handlers::registrations::delete))
        .route("/proposals/:id/acknowledge", post(handlers::proposals::acknowledge))
        .route("/proposals/:id/object", post(handlers::proposals::object))
        .route("/proposals/:id/withdraw", post(handlers::proposals::withdraw))
        .route("/proposals/:id/publish", post(handlers::proposals::publish))
        .route("/bulk/acknowledgments", post(handlers::proposals::bulk_acknowledge))
        .route("/sync/dbt/impact", post(handlers::sync::dbt_impact));
    let write_routes = tiered(write_routes, limiters.clone(), Tier::Write);

    let admin_routes = Router::new()
        .route("/teams/:id", axum::routing::delete(handlers::teams::delete))
        .route("/teams/:id/api-keys", post(handlers::api_keys::create))
        .route("/proposals/:id/force", post(handlers::proposals::force))
        .route("/sync/dbt/upload", post(handlers::sync::dbt_upload))
        .route("/sync/openapi", post(handlers::sync::openapi_upload))
        .route("/sync/graphql", post(handlers::sync::graphql_upload))
        .route("/sync/push", post(handlers::sync::push))
        .route("/sync/pull", post(handlers::sync::pull));
    let admin_routes = tiered(admin_routes, limiters.clone(), Tier::Admin);

    let protected = read_routes
        .merge(expensive_routes)
        .merge(write_routes)
        .merge(admin_routes)
        .layer(axum_mw::from_fn(auth_middleware));
    let protected = tiered(protected, limiters, Tier::Auth);

    let public = Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/live", get(handlers::health::live))
        .route("/health/ready", get(handlers::health::ready))
        .route("/schemas/validate", post(handlers::schemas::validate));

    public
        .merge(protected)
        .layer(axum_mw::from_fn(security_headers::layer(state.config.environment.is_production())))
        .layer(axum_mw::from_fn(request_id_middleware))
        .layer(Extension(state))
}
