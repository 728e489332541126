//! Shared application state, cloned cheaply into every request via an
//! `Extension` layer (the teacher's router wires a `CoreService` the same
//! way).

use std::sync::Arc;

use tessera_core::ports::Stores;
use tessera_core::service::CoreService;

use crate::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<dyn CoreService>,
    pub stores: Arc<Stores>,
    pub config: Arc<Config>,
    pub db_pool: sqlx::PgPool,
}
