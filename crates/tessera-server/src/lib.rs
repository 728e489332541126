//! tessera-server — standalone REST server for Tessera.
//!
//! Provides API-key/session-authenticated REST endpoints backed by
//! `CoreService`. See `router::build_router` for the full route map.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod null_cache;
pub mod router;
pub mod state;
pub mod webhook_notifier;
pub mod webhook_recorder;
