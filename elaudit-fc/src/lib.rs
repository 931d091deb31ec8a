//! elaudit-fc library - EL audit field client
//!
//! Owns the client-local sync engine for one audit session: module store,
//! offline queue, Hub client, conflict resolution, presence tracking and the
//! scheduler driving the periodic work. The local HTTP API in [`api`] is the
//! surface the tablet UI talks to.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod db;
pub mod engine;
pub mod hub;
pub mod import;
pub mod measures;
pub mod presence;
pub mod queue;
pub mod report;
pub mod resolver;
pub mod scheduler;
pub mod store;

use engine::SyncEngine;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
}

impl AppState {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self { engine }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/audit", get(api::get_audit))
        .route("/api/audit/stats", get(api::get_stats))
        .route("/api/module/:id", post(api::update_module))
        .route("/api/bulk", post(api::bulk_update))
        .route("/api/technicians", get(api::get_technicians))
        .route("/api/connectivity", post(api::set_connectivity))
        .route("/api/export.csv", get(api::export_csv))
        .route("/api/import/validate", post(api::validate_import))
        .route("/api/measures/parse", post(api::parse_measures))
        .route("/api/summary/push", post(api::push_summary))
        .route("/api/events", get(api::events_stream))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
