//! Audit endpoints: snapshot, mutations, reports and utilities

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use elaudit_common::api::TechnicianInfo;
use elaudit_common::model::{AuditSession, ModuleRecord, ModuleStatus};

use super::ApiError;
use crate::engine::BulkOutcome;
use crate::measures::ParseOutcome;
use crate::{import, measures, report, AppState};

/// Response of GET /api/audit
#[derive(Debug, Serialize)]
pub struct AuditView {
    pub audit: AuditSession,
    pub modules: Vec<ModuleRecord>,
    pub stats: report::AuditStats,
    pub online: bool,
    pub queued_updates: usize,
}

/// GET /api/audit
///
/// Audit metadata plus the ordered module snapshot and progress numbers.
pub async fn get_audit(State(state): State<AppState>) -> Json<AuditView> {
    let engine = &state.engine;
    let audit = engine.audit().await;
    let modules = engine.snapshot().await;
    let stats = report::compute_stats(&modules);

    Json(AuditView {
        audit,
        modules,
        stats,
        online: engine.is_online(),
        queued_updates: engine.queue_len().await,
    })
}

/// GET /api/audit/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<report::AuditStats> {
    let modules = state.engine.snapshot().await;
    Json(report::compute_stats(&modules))
}

/// Body of POST /api/module/{id}
#[derive(Debug, Deserialize)]
pub struct LocalUpdateRequest {
    pub status: ModuleStatus,
    #[serde(default)]
    pub comment: Option<String>,
}

/// POST /api/module/{id}
///
/// Local mutation plus immediate push (online) or queueing (offline).
pub async fn update_module(
    State(state): State<AppState>,
    Path(module_id): Path<String>,
    Json(request): Json<LocalUpdateRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let record = state
        .engine
        .set_module_status(&module_id, request.status, request.comment)
        .await?;

    Ok(Json(json!({
        "success": true,
        "module": record,
    })))
}

/// Body of POST /api/bulk
#[derive(Debug, Deserialize)]
pub struct LocalBulkRequest {
    pub modules: Vec<String>,
    pub status: ModuleStatus,
    #[serde(default)]
    pub comment: Option<String>,
}

/// POST /api/bulk
pub async fn bulk_update(
    State(state): State<AppState>,
    Json(request): Json<LocalBulkRequest>,
) -> Result<Json<BulkOutcome>, ApiError> {
    let outcome = state
        .engine
        .bulk_update(&request.modules, request.status, request.comment)
        .await?;
    Ok(Json(outcome))
}

/// Response of GET /api/technicians
#[derive(Debug, Serialize)]
pub struct TechniciansView {
    pub technicians: Vec<TechnicianInfo>,
    pub heartbeat_failures: u64,
}

/// GET /api/technicians
///
/// Cached presence list; possibly stale when refreshes are failing, which is
/// visible through the failure counter.
pub async fn get_technicians(State(state): State<AppState>) -> Json<TechniciansView> {
    Json(TechniciansView {
        technicians: state.engine.technicians().await,
        heartbeat_failures: state.engine.heartbeat_failure_count(),
    })
}

/// Body of POST /api/connectivity
#[derive(Debug, Deserialize)]
pub struct ConnectivityRequest {
    pub online: bool,
}

/// POST /api/connectivity
///
/// The UI reports the runtime's online/offline signal here; going online
/// triggers the offline-queue replay.
pub async fn set_connectivity(
    State(state): State<AppState>,
    Json(request): Json<ConnectivityRequest>,
) -> Json<serde_json::Value> {
    state.engine.set_online(request.online).await;
    Json(json!({
        "success": true,
        "online": request.online,
    }))
}

/// GET /api/export.csv
pub async fn export_csv(State(state): State<AppState>) -> impl IntoResponse {
    let modules = state.engine.snapshot().await;
    let csv = report::to_csv(&modules);

    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"audit-modules.csv\""),
        ],
        csv,
    )
}

/// Response of POST /api/import/validate
#[derive(Debug, Serialize)]
pub struct ImportValidation {
    pub success: bool,
    pub project_name: String,
    pub string_count: u32,
    pub total_modules: u32,
}

/// POST /api/import/validate
///
/// Validates a site-map JSON file and reports the derived layout. The body
/// is the raw import file.
pub async fn validate_import(body: String) -> Result<Json<ImportValidation>, ApiError> {
    let site = import::parse_import(&body)?;
    let config = site.to_config();

    Ok(Json(ImportValidation {
        success: true,
        project_name: site.project_name,
        string_count: config.string_count(),
        total_modules: config.total_modules(),
    }))
}

/// Body of POST /api/measures/parse
#[derive(Debug, Deserialize)]
pub struct MeasuresRequest {
    pub content: String,
}

/// POST /api/measures/parse
///
/// Parses a PVserv text export and returns measurements plus summary.
pub async fn parse_measures(Json(request): Json<MeasuresRequest>) -> Json<ParseOutcome> {
    Json(measures::parse_pvserv(&request.content))
}

/// POST /api/summary/push
///
/// Pushes the audit summary to the Hub project registry.
pub async fn push_summary(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.engine.push_project_summary().await?;
    Ok(Json(json!({ "success": true })))
}
