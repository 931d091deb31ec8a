//! Hub API request/response types
//!
//! Wire types for the remote Hub HTTP API. The Hub is an opaque external
//! service; these types mirror its REST+JSON contract (camelCase fields).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{AuditSession, ModuleRecord, ModuleStatus};

/// Body of `POST /api/audit/{token}/module/{moduleId}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleUpdateRequest {
    pub status: ModuleStatus,
    pub comment: Option<String>,
    pub technician_id: String,
}

/// Generic `{success}` acknowledgment returned by several Hub endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AckResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `POST /api/audit/{token}/bulk-update`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateRequest {
    pub modules: Vec<String>,
    pub status: ModuleStatus,
    pub comment: Option<String>,
    pub technician_id: String,
}

/// Response to a bulk update; partial success is reported, not failed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkUpdateResponse {
    pub success: bool,
    #[serde(default)]
    pub updated: u32,
    #[serde(default)]
    pub not_found: u32,
}

/// One remote module mutation from `GET /api/audit/{token}/updates`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteUpdate {
    pub module_id: String,
    pub status: ModuleStatus,
    pub comment: Option<String>,
    pub technician_id: String,
    #[serde(default)]
    pub technician_name: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// Response of the incremental updates endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatesResponse {
    pub success: bool,
    #[serde(default)]
    pub updates: Vec<RemoteUpdate>,
}

/// Body of `POST /api/audit/{token}/heartbeat`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeartbeatRequest {
    pub technician_id: String,
    pub technician_name: String,
}

/// One technician currently active on the audit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianInfo {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}

/// Response of `GET /api/audit/{token}/technicians`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TechniciansResponse {
    pub success: bool,
    #[serde(default)]
    pub technicians: Vec<TechnicianInfo>,
}

/// Response of `GET /api/audit/{token}` (full audit fetch on cold start)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditFetchResponse {
    pub audit: AuditSession,
    pub modules: Vec<ModuleRecord>,
}

/// Audit summary pushed to the Hub project registry once an audit completes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    pub audit_token: String,
    pub project_name: String,
    pub client_name: String,
    pub site_address: String,
    pub total_modules: u32,
    /// Installed power in kWc; estimated at 0.4 kWc per module when unknown
    pub installed_power: f64,
    pub string_count: u32,
    pub defects_found: u32,
    /// Percentage with one decimal
    pub conformity_rate: f64,
    /// Completion percentage (0-100)
    pub progress: f64,
    pub audit_date: DateTime<Utc>,
    pub technicians: Vec<String>,
    pub audit_type: String,
}
