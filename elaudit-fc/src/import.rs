//! Site-map JSON import
//!
//! Validates uploaded site cartography files and turns them into an audit
//! configuration plus a fresh module index. Used for large installations
//! where filling the creation form by hand is impractical.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use elaudit_common::model::{AuditConfig, AuditSession, ModuleRecord, StringConfig};
use elaudit_common::{time, Error, Result};

/// Top-level import file: the payload lives under a fixed section key so
/// unrelated JSON files are rejected with a clear message
#[derive(Debug, Deserialize)]
struct ImportFile {
    el_audit_import: Option<SiteImport>,
}

/// One string entry in an advanced site map
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ImportString {
    pub mppt_number: u32,
    #[serde(default = "default_string_number")]
    pub string_number: u32,
    pub module_count: u32,
}

fn default_string_number() -> u32 {
    1
}

/// Parsed site-map payload
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SiteImport {
    pub project_name: String,
    pub client_name: String,
    pub location: String,
    #[serde(default)]
    pub string_count: u32,
    #[serde(default)]
    pub modules_per_string: u32,
    /// Advanced layout; takes precedence over the simple fields when present
    #[serde(default)]
    pub strings: Vec<ImportString>,
}

/// Parse and validate an import file
pub fn parse_import(json: &str) -> Result<SiteImport> {
    let file: ImportFile = serde_json::from_str(json)
        .map_err(|e| Error::InvalidInput(format!("Invalid JSON: {}", e)))?;

    let import = file
        .el_audit_import
        .ok_or_else(|| Error::InvalidInput("Missing \"el_audit_import\" section".to_string()))?;

    import.validate()?;
    Ok(import)
}

impl SiteImport {
    /// Check required fields and layout bounds
    pub fn validate(&self) -> Result<()> {
        if self.project_name.trim().is_empty()
            || self.client_name.trim().is_empty()
            || self.location.trim().is_empty()
        {
            return Err(Error::InvalidInput(
                "Project name, client name and location are required".to_string(),
            ));
        }

        if self.strings.is_empty() && (self.string_count == 0 || self.modules_per_string == 0) {
            return Err(Error::InvalidInput(
                "String count and modules per string must be at least 1".to_string(),
            ));
        }

        // Layout bounds (incl. the module ceiling) are the config's to check
        self.to_config().validate()?;

        Ok(())
    }

    /// Derive the string layout configuration
    pub fn to_config(&self) -> AuditConfig {
        if self.strings.is_empty() {
            AuditConfig::Simple {
                string_count: self.string_count,
                modules_per_string: self.modules_per_string,
            }
        } else {
            AuditConfig::Advanced {
                strings: self
                    .strings
                    .iter()
                    .map(|s| StringConfig {
                        mppt_number: s.mppt_number,
                        string_number: s.string_number,
                        module_count: s.module_count,
                    })
                    .collect(),
            }
        }
    }

    /// Build a new local audit session and its pending module index
    ///
    /// The token is freshly generated; registering the audit with the Hub is
    /// a separate step owned by the creation flow.
    pub fn into_audit(self) -> (AuditSession, Vec<ModuleRecord>) {
        let config = self.to_config();
        let modules = config.build_module_index();

        let audit = AuditSession {
            token: Uuid::new_v4().to_string(),
            project_name: self.project_name,
            client_name: self.client_name,
            location: self.location,
            string_count: config.string_count(),
            created_at: time::now(),
        };

        (audit, modules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_import() {
        let json = r#"{
            "el_audit_import": {
                "project_name": "Warehouse Roof",
                "client_name": "Acme Energy",
                "location": "Toulouse",
                "string_count": 4,
                "modules_per_string": 20
            }
        }"#;

        let import = parse_import(json).unwrap();
        assert_eq!(import.project_name, "Warehouse Roof");
        assert_eq!(import.to_config().total_modules(), 80);

        let (audit, modules) = import.into_audit();
        assert_eq!(audit.string_count, 4);
        assert_eq!(modules.len(), 80);
        assert_eq!(modules[0].id, "M001");
    }

    #[test]
    fn test_parse_advanced_import_overrides_simple_fields() {
        let json = r#"{
            "el_audit_import": {
                "project_name": "Field West",
                "client_name": "Acme",
                "location": "Nantes",
                "strings": [
                    { "mppt_number": 1, "module_count": 26 },
                    { "mppt_number": 2, "module_count": 24 }
                ]
            }
        }"#;

        let import = parse_import(json).unwrap();
        let config = import.to_config();
        assert_eq!(config.total_modules(), 50);
        assert_eq!(config.string_count(), 2);
    }

    #[test]
    fn test_missing_section_rejected() {
        let err = parse_import(r#"{"something_else": {}}"#).unwrap_err();
        assert!(err.to_string().contains("el_audit_import"));
    }

    #[test]
    fn test_missing_project_fields_rejected() {
        let json = r#"{
            "el_audit_import": {
                "project_name": "",
                "client_name": "Acme",
                "location": "Nantes",
                "string_count": 2,
                "modules_per_string": 10
            }
        }"#;
        assert!(parse_import(json).is_err());
    }

    #[test]
    fn test_zero_counts_rejected() {
        let json = r#"{
            "el_audit_import": {
                "project_name": "P",
                "client_name": "C",
                "location": "L",
                "string_count": 0,
                "modules_per_string": 10
            }
        }"#;
        assert!(parse_import(json).is_err());
    }

    #[test]
    fn test_oversized_site_rejected() {
        let json = r#"{
            "el_audit_import": {
                "project_name": "P",
                "client_name": "C",
                "location": "L",
                "string_count": 1000,
                "modules_per_string": 50
            }
        }"#;
        let err = parse_import(json).unwrap_err();
        assert!(err.to_string().contains("20000") || err.to_string().contains("20 000"));
    }

    #[test]
    fn test_not_json_rejected() {
        assert!(parse_import("not json at all").is_err());
    }
}
