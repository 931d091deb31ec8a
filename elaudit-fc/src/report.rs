//! Audit statistics and report data
//!
//! Status counts, conformity rate and the summary payload pushed to the Hub
//! project registry. Rendering (HTML/PDF) is the UI's job; this module only
//! produces the numbers and a CSV listing.

use serde::Serialize;

use elaudit_common::api::ProjectSummary;
use elaudit_common::model::{AuditSession, ModuleRecord, ModuleStatus};

/// Estimated module power when the real value is unknown (kWc)
const DEFAULT_MODULE_POWER_KWC: f64 = 0.4;

/// Aggregated counts over the module index
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AuditStats {
    pub total: usize,
    pub completed: usize,
    pub ok: usize,
    pub inequality: usize,
    pub microcracks: usize,
    pub dead: usize,
    pub string_open: usize,
    pub not_connected: usize,
    /// Inspected and defective (everything but pending/ok)
    pub defects: usize,
    /// Percent of non-defective modules, one decimal
    pub conformity_rate: f64,
    /// Completion percent (0-100)
    pub progress: f64,
}

/// Compute statistics over a module listing
pub fn compute_stats(modules: &[ModuleRecord]) -> AuditStats {
    let count = |status: ModuleStatus| modules.iter().filter(|m| m.status == status).count();

    let total = modules.len();
    let completed = modules.iter().filter(|m| m.status.is_completed()).count();
    let defects = modules.iter().filter(|m| m.status.is_defect()).count();

    AuditStats {
        total,
        completed,
        ok: count(ModuleStatus::Ok),
        inequality: count(ModuleStatus::Inequality),
        microcracks: count(ModuleStatus::Microcracks),
        dead: count(ModuleStatus::Dead),
        string_open: count(ModuleStatus::StringOpen),
        not_connected: count(ModuleStatus::NotConnected),
        defects,
        conformity_rate: conformity_rate(total, defects),
        progress: if total == 0 {
            0.0
        } else {
            (completed as f64 / total as f64) * 100.0
        },
    }
}

/// Conformity as percent of non-defective modules, rounded to one decimal
///
/// An empty audit counts as fully conform.
pub fn conformity_rate(total: usize, defects: usize) -> f64 {
    if total == 0 {
        return 100.0;
    }
    let conform = total.saturating_sub(defects);
    ((conform as f64 / total as f64) * 100.0 * 10.0).round() / 10.0
}

/// Defect counts per status, in display order, zero-count statuses omitted
pub fn defects_by_type(modules: &[ModuleRecord]) -> Vec<(ModuleStatus, usize)> {
    ModuleStatus::all()
        .iter()
        .filter(|s| s.is_defect())
        .map(|s| (*s, modules.iter().filter(|m| m.status == *s).count()))
        .filter(|(_, count)| *count > 0)
        .collect()
}

/// CSV listing of the module index (RFC-4180 quoting)
pub fn to_csv(modules: &[ModuleRecord]) -> String {
    let mut out = String::from("module_id,string,position,status,comment,technician,updated_at\n");
    for m in modules {
        let row = [
            m.id.clone(),
            m.string_number.map(|n| n.to_string()).unwrap_or_default(),
            m.position_in_string.map(|n| n.to_string()).unwrap_or_default(),
            m.status.as_str().to_string(),
            m.comment.clone().unwrap_or_default(),
            m.last_modified_by.clone().unwrap_or_default(),
            m.last_modified_at.to_rfc3339(),
        ];
        let escaped: Vec<String> = row.iter().map(|field| csv_field(field)).collect();
        out.push_str(&escaped.join(","));
        out.push('\n');
    }
    out
}

fn csv_field(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Build the summary payload for the Hub project registry
pub fn project_summary(
    audit: &AuditSession,
    modules: &[ModuleRecord],
    technicians: Vec<String>,
) -> ProjectSummary {
    let stats = compute_stats(modules);

    ProjectSummary {
        audit_token: audit.token.clone(),
        project_name: audit.project_name.clone(),
        client_name: audit.client_name.clone(),
        site_address: audit.location.clone(),
        total_modules: stats.total as u32,
        installed_power: stats.total as f64 * DEFAULT_MODULE_POWER_KWC,
        string_count: audit.string_count,
        defects_found: stats.defects as u32,
        conformity_rate: stats.conformity_rate,
        progress: stats.progress,
        audit_date: audit.created_at,
        technicians,
        audit_type: "electroluminescence".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elaudit_common::time;

    fn module(id: &str, status: ModuleStatus) -> ModuleRecord {
        let mut m = ModuleRecord::new(id, 1, 1);
        m.status = status;
        m
    }

    #[test]
    fn test_stats_counts() {
        let modules = vec![
            module("M001", ModuleStatus::Ok),
            module("M002", ModuleStatus::Ok),
            module("M003", ModuleStatus::Microcracks),
            module("M004", ModuleStatus::Dead),
            module("M005", ModuleStatus::Pending),
        ];

        let stats = compute_stats(&modules);
        assert_eq!(stats.total, 5);
        assert_eq!(stats.completed, 4);
        assert_eq!(stats.ok, 2);
        assert_eq!(stats.microcracks, 1);
        assert_eq!(stats.dead, 1);
        assert_eq!(stats.defects, 2);
        assert_eq!(stats.progress, 80.0);
        // 3 of 5 non-defective
        assert_eq!(stats.conformity_rate, 60.0);
    }

    #[test]
    fn test_conformity_one_decimal() {
        // 2 defects out of 3 modules: 33.333..% conform rounds to 33.3
        assert_eq!(conformity_rate(3, 2), 33.3);
        assert_eq!(conformity_rate(0, 0), 100.0);
        assert_eq!(conformity_rate(8, 1), 87.5);
    }

    #[test]
    fn test_defects_by_type_omits_zero_counts() {
        let modules = vec![
            module("M001", ModuleStatus::Dead),
            module("M002", ModuleStatus::Dead),
            module("M003", ModuleStatus::Ok),
        ];

        let defects = defects_by_type(&modules);
        assert_eq!(defects, vec![(ModuleStatus::Dead, 2)]);
    }

    #[test]
    fn test_csv_escapes_commas_and_quotes() {
        let mut m = module("M001", ModuleStatus::Microcracks);
        m.comment = Some("corner cell, see \"photo 3\"".to_string());
        m.last_modified_by = Some("tech_a".to_string());

        let csv = to_csv(&[m]);
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "module_id,string,position,status,comment,technician,updated_at"
        );
        let row = lines.next().unwrap();
        assert!(row.starts_with("M001,1,1,microcracks,"));
        assert!(row.contains("\"corner cell, see \"\"photo 3\"\"\""));
    }

    #[test]
    fn test_project_summary_estimates_power() {
        let audit = AuditSession {
            token: "tok-sum".to_string(),
            project_name: "Roof A".to_string(),
            client_name: "Acme".to_string(),
            location: "Lyon".to_string(),
            string_count: 2,
            created_at: time::now(),
        };
        let modules: Vec<ModuleRecord> = (1..=10)
            .map(|i| module(&format!("M{:03}", i), ModuleStatus::Ok))
            .collect();

        let summary = project_summary(&audit, &modules, vec!["Ana".to_string()]);
        assert_eq!(summary.total_modules, 10);
        assert!((summary.installed_power - 4.0).abs() < 1e-9);
        assert_eq!(summary.conformity_rate, 100.0);
        assert_eq!(summary.progress, 100.0);
        assert_eq!(summary.audit_type, "electroluminescence");
    }
}
