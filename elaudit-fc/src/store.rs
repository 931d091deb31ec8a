//! Local Module Store
//!
//! Single in-memory source of truth for module state during a session, with
//! durable mirroring into the local key-value table. Restoring tolerates
//! absent or malformed snapshots by reporting "no session" so the caller can
//! fall back to a full Hub fetch.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use elaudit_common::api::AuditFetchResponse;
use elaudit_common::model::{AuditSession, ModuleRecord};
use elaudit_common::{time, Result};

use crate::db::state as db_state;

/// Persisted snapshot layout: one entry per audit token
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedAudit {
    audit_token: String,
    audit_data: AuditSession,
    modules: Vec<(String, ModuleRecord)>,
    /// Epoch milliseconds of the last successful Hub sync
    last_sync: i64,
}

/// In-memory module index for one audit session
#[derive(Debug)]
pub struct ModuleStore {
    audit: AuditSession,
    modules: HashMap<String, ModuleRecord>,
    last_sync_ms: i64,
}

impl ModuleStore {
    /// Build a store from a full Hub fetch (cold start)
    pub fn from_fetch(payload: AuditFetchResponse) -> Self {
        let modules = payload
            .modules
            .into_iter()
            .map(|m| (m.id.clone(), m))
            .collect();
        Self {
            audit: payload.audit,
            modules,
            last_sync_ms: time::to_epoch_ms(time::now()),
        }
    }

    /// Load a previously persisted session matching `token`
    ///
    /// Returns `Ok(None)` when nothing usable is stored: absent entry, or a
    /// payload that fails to parse (logged, then treated as absent).
    pub async fn restore(db: &SqlitePool, token: &str) -> Result<Option<Self>> {
        let raw = match db_state::load_audit_state(db, token).await? {
            Some(raw) => raw,
            None => return Ok(None),
        };

        let persisted: PersistedAudit = match serde_json::from_str(&raw) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(
                    audit_token = token,
                    "Discarding malformed persisted session: {}",
                    e
                );
                return Ok(None);
            }
        };

        Ok(Some(Self {
            audit: persisted.audit_data,
            modules: persisted.modules.into_iter().collect(),
            last_sync_ms: persisted.last_sync,
        }))
    }

    /// Serialize the full module index plus session metadata to the database
    pub async fn persist(&self, db: &SqlitePool) -> Result<()> {
        let persisted = PersistedAudit {
            audit_token: self.audit.token.clone(),
            audit_data: self.audit.clone(),
            modules: self
                .modules
                .iter()
                .map(|(id, record)| (id.clone(), record.clone()))
                .collect(),
            last_sync: self.last_sync_ms,
        };
        let json = serde_json::to_string(&persisted)
            .map_err(|e| elaudit_common::Error::Internal(format!("Serialize session failed: {}", e)))?;

        db_state::save_audit_state(db, &self.audit.token, &json).await
    }

    pub fn audit(&self) -> &AuditSession {
        &self.audit
    }

    pub fn get(&self, id: &str) -> Option<&ModuleRecord> {
        self.modules.get(id)
    }

    /// Replace (or insert) a record
    ///
    /// The record is stored as given; callers that want "modified now"
    /// semantics stamp `last_modified_at` before calling (see
    /// [`ModuleStore::apply_local`]).
    pub fn set(&mut self, record: ModuleRecord) {
        self.modules.insert(record.id.clone(), record);
    }

    /// Apply a local mutation, stamping the modification time and author
    ///
    /// Returns the updated record, or `None` when the module id is unknown.
    pub fn apply_local(
        &mut self,
        module_id: &str,
        status: elaudit_common::ModuleStatus,
        comment: Option<String>,
        technician_id: &str,
    ) -> Option<ModuleRecord> {
        let record = self.modules.get_mut(module_id)?;
        record.status = status;
        record.comment = comment;
        record.last_modified_by = Some(technician_id.to_string());
        record.last_modified_at = time::now();
        Some(record.clone())
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Stable ordered listing for rendering and reports
    ///
    /// Sorted by string number, then position in string, then id; records
    /// without placement metadata sort last. Never mutates store state.
    pub fn snapshot(&self) -> Vec<ModuleRecord> {
        let mut modules: Vec<ModuleRecord> = self.modules.values().cloned().collect();
        modules.sort_by(|a, b| {
            let key_a = (
                a.string_number.unwrap_or(u32::MAX),
                a.position_in_string.unwrap_or(u32::MAX),
            );
            let key_b = (
                b.string_number.unwrap_or(u32::MAX),
                b.position_in_string.unwrap_or(u32::MAX),
            );
            key_a.cmp(&key_b).then_with(|| a.id.cmp(&b.id))
        });
        modules
    }

    pub fn last_sync_ms(&self) -> i64 {
        self.last_sync_ms
    }

    /// Record the wall-clock time of a successful Hub sync
    pub fn mark_synced(&mut self) {
        self.last_sync_ms = time::to_epoch_ms(time::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use elaudit_common::model::ModuleStatus;

    fn test_audit(token: &str) -> AuditSession {
        AuditSession {
            token: token.to_string(),
            project_name: "Solar Farm North".to_string(),
            client_name: "Acme Energy".to_string(),
            location: "Montpellier".to_string(),
            string_count: 2,
            created_at: time::now(),
        }
    }

    fn test_store(token: &str) -> ModuleStore {
        let mut store = ModuleStore {
            audit: test_audit(token),
            modules: HashMap::new(),
            last_sync_ms: 0,
        };
        store.set(ModuleRecord::new("M001", 1, 1));
        store.set(ModuleRecord::new("M002", 1, 2));
        store.set(ModuleRecord::new("M003", 2, 1));
        store
    }

    #[tokio::test]
    async fn test_persist_restore_roundtrip() {
        let pool = memory_pool().await;
        let mut store = test_store("tok-rt");
        store.apply_local("M002", ModuleStatus::Microcracks, Some("corner cell".into()), "tech_a");
        store.persist(&pool).await.unwrap();

        let restored = ModuleStore::restore(&pool, "tok-rt").await.unwrap().unwrap();

        assert_eq!(restored.len(), 3);
        let m2 = restored.get("M002").unwrap();
        assert_eq!(m2.status, ModuleStatus::Microcracks);
        assert_eq!(m2.comment.as_deref(), Some("corner cell"));
        assert_eq!(restored.audit(), store.audit());

        // Every record survives by id/status/comment
        for record in store.snapshot() {
            let back = restored.get(&record.id).unwrap();
            assert_eq!(back.status, record.status);
            assert_eq!(back.comment, record.comment);
        }
    }

    #[tokio::test]
    async fn test_restore_absent_returns_none() {
        let pool = memory_pool().await;
        assert!(ModuleStore::restore(&pool, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_restore_malformed_returns_none() {
        let pool = memory_pool().await;
        db_state::save_audit_state(&pool, "bad", "{ not json").await.unwrap();

        assert!(ModuleStore::restore(&pool, "bad").await.unwrap().is_none());
    }

    #[test]
    fn test_snapshot_ordering() {
        let store = test_store("tok-ord");
        let snapshot = store.snapshot();
        let ids: Vec<&str> = snapshot.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["M001", "M002", "M003"]);
    }

    #[test]
    fn test_snapshot_orders_unplaced_last() {
        let mut store = test_store("tok-unplaced");
        let mut loose = ModuleRecord::new("M999", 0, 0);
        loose.string_number = None;
        loose.position_in_string = None;
        store.set(loose);

        let snapshot = store.snapshot();
        assert_eq!(snapshot.last().unwrap().id, "M999");
    }

    #[test]
    fn test_apply_local_stamps_author_and_time() {
        let mut store = test_store("tok-stamp");
        let before = store.get("M001").unwrap().last_modified_at;

        let updated = store
            .apply_local("M001", ModuleStatus::Dead, None, "tech_z")
            .unwrap();

        assert_eq!(updated.status, ModuleStatus::Dead);
        assert_eq!(updated.last_modified_by.as_deref(), Some("tech_z"));
        assert!(updated.last_modified_at >= before);
    }

    #[test]
    fn test_apply_local_unknown_module() {
        let mut store = test_store("tok-unknown");
        assert!(store
            .apply_local("M404", ModuleStatus::Ok, None, "tech_z")
            .is_none());
    }
}
