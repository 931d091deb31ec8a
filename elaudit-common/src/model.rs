//! Audit data model
//!
//! Core types shared between the field client, its persistence layer and the
//! Hub API: module diagnostic statuses, per-module records, audit sessions
//! and string-layout configuration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Hard ceiling on modules per audit (matches Hub-side validation)
pub const MAX_MODULES: u32 = 20_000;

/// Diagnostic status of a single PV module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleStatus {
    /// Not yet inspected
    Pending,
    /// No defect visible under electroluminescence
    Ok,
    /// Luminance inequality between cells
    Inequality,
    /// Microcracks detected
    Microcracks,
    /// Module dead (no emission)
    Dead,
    /// Whole string open circuit
    StringOpen,
    /// Module not connected
    NotConnected,
}

impl ModuleStatus {
    /// Stable snake_case identifier used on the wire and in SQLite
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleStatus::Pending => "pending",
            ModuleStatus::Ok => "ok",
            ModuleStatus::Inequality => "inequality",
            ModuleStatus::Microcracks => "microcracks",
            ModuleStatus::Dead => "dead",
            ModuleStatus::StringOpen => "string_open",
            ModuleStatus::NotConnected => "not_connected",
        }
    }

    /// Human-readable label for reports and notifications
    pub fn label(&self) -> &'static str {
        match self {
            ModuleStatus::Pending => "Pending",
            ModuleStatus::Ok => "OK",
            ModuleStatus::Inequality => "Inequality",
            ModuleStatus::Microcracks => "Microcracks",
            ModuleStatus::Dead => "Dead",
            ModuleStatus::StringOpen => "String open",
            ModuleStatus::NotConnected => "Not connected",
        }
    }

    /// A module counts toward audit progress once it is anything but pending
    pub fn is_completed(&self) -> bool {
        !matches!(self, ModuleStatus::Pending)
    }

    /// Inspected and found defective (everything except pending/ok)
    pub fn is_defect(&self) -> bool {
        !matches!(self, ModuleStatus::Pending | ModuleStatus::Ok)
    }

    /// All statuses in display order
    pub fn all() -> &'static [ModuleStatus] {
        &[
            ModuleStatus::Pending,
            ModuleStatus::Ok,
            ModuleStatus::Inequality,
            ModuleStatus::Microcracks,
            ModuleStatus::Dead,
            ModuleStatus::StringOpen,
            ModuleStatus::NotConnected,
        ]
    }
}

impl std::str::FromStr for ModuleStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(ModuleStatus::Pending),
            "ok" => Ok(ModuleStatus::Ok),
            "inequality" => Ok(ModuleStatus::Inequality),
            "microcracks" => Ok(ModuleStatus::Microcracks),
            "dead" => Ok(ModuleStatus::Dead),
            "string_open" => Ok(ModuleStatus::StringOpen),
            "not_connected" => Ok(ModuleStatus::NotConnected),
            other => Err(Error::InvalidInput(format!("Unknown module status: {}", other))),
        }
    }
}

impl std::fmt::Display for ModuleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of one physical PV module within an audit
///
/// At most one record exists per `id` within an audit. `last_modified_at`
/// always reflects the wall-clock time of the most recent accepted mutation,
/// whether it originated locally or from the Hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleRecord {
    /// Stable identifier, unique within the audit (e.g. "M012")
    pub id: String,
    pub status: ModuleStatus,
    pub comment: Option<String>,
    pub string_number: Option<u32>,
    pub position_in_string: Option<u32>,
    /// Technician who produced the current state
    pub last_modified_by: Option<String>,
    pub last_modified_at: DateTime<Utc>,
}

impl ModuleRecord {
    /// Create a fresh pending record at a physical position
    pub fn new(id: impl Into<String>, string_number: u32, position_in_string: u32) -> Self {
        Self {
            id: id.into(),
            status: ModuleStatus::Pending,
            comment: None,
            string_number: Some(string_number),
            position_in_string: Some(position_in_string),
            last_modified_by: None,
            last_modified_at: crate::time::now(),
        }
    }
}

/// Audit session metadata, owned by the Hub and mirrored locally
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSession {
    /// Opaque identifier, stable for the audit's lifetime
    pub token: String,
    pub project_name: String,
    pub client_name: String,
    pub location: String,
    /// Defines the valid range for `ModuleRecord::string_number`
    pub string_count: u32,
    pub created_at: DateTime<Utc>,
}

/// A module-status change buffered while the Hub is unreachable
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingUpdate {
    pub module_id: String,
    pub status: ModuleStatus,
    pub comment: Option<String>,
    pub technician_id: String,
    pub enqueued_at: DateTime<Utc>,
}

/// Stable per-device technician identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicianIdentity {
    pub id: String,
    pub name: String,
}

/// Layout of one electrical string in an advanced configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StringConfig {
    pub mppt_number: u32,
    pub string_number: u32,
    pub module_count: u32,
}

/// String layout of an installation
///
/// Simple installations have uniform strings; advanced ones list each string
/// with its MPPT assignment and module count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AuditConfig {
    Simple {
        string_count: u32,
        modules_per_string: u32,
    },
    Advanced {
        strings: Vec<StringConfig>,
    },
}

impl AuditConfig {
    pub fn string_count(&self) -> u32 {
        match self {
            AuditConfig::Simple { string_count, .. } => *string_count,
            AuditConfig::Advanced { strings } => strings.len() as u32,
        }
    }

    pub fn total_modules(&self) -> u32 {
        match self {
            AuditConfig::Simple { string_count, modules_per_string } => {
                string_count * modules_per_string
            }
            AuditConfig::Advanced { strings } => strings.iter().map(|s| s.module_count).sum(),
        }
    }

    /// Validate layout bounds before building an audit from it
    pub fn validate(&self) -> Result<()> {
        match self {
            AuditConfig::Simple { string_count, modules_per_string } => {
                if *string_count == 0 || *modules_per_string == 0 {
                    return Err(Error::InvalidInput(
                        "String and module counts must be greater than zero".to_string(),
                    ));
                }
            }
            AuditConfig::Advanced { strings } => {
                if strings.is_empty() {
                    return Err(Error::InvalidInput("No strings configured".to_string()));
                }
                if strings.iter().any(|s| s.module_count == 0) {
                    return Err(Error::InvalidInput(
                        "Every string must contain at least one module".to_string(),
                    ));
                }
            }
        }
        if self.total_modules() > MAX_MODULES {
            return Err(Error::InvalidInput(format!(
                "Maximum {} modules supported (got {})",
                MAX_MODULES,
                self.total_modules()
            )));
        }
        Ok(())
    }

    /// Generate the pending module index for this layout
    ///
    /// Ids are sequential across the whole audit ("M001", "M002", ...) while
    /// string/position metadata follows the configured layout.
    pub fn build_module_index(&self) -> Vec<ModuleRecord> {
        let per_string: Vec<u32> = match self {
            AuditConfig::Simple { string_count, modules_per_string } => {
                (0..*string_count).map(|_| *modules_per_string).collect()
            }
            AuditConfig::Advanced { strings } => {
                strings.iter().map(|s| s.module_count).collect()
            }
        };

        let mut modules = Vec::with_capacity(self.total_modules() as usize);
        let mut seq = 0u32;
        for (string_idx, count) in per_string.iter().enumerate() {
            for position in 1..=*count {
                seq += 1;
                modules.push(ModuleRecord::new(
                    format!("M{:03}", seq),
                    string_idx as u32 + 1,
                    position,
                ));
            }
        }
        modules
    }
}
