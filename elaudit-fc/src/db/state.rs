//! Durable local state operations
//!
//! Provides get/set accessors over the `local_state` table following the
//! key-value pattern: one entry per audit token holding the serialized
//! snapshot, one entry for the device's technician identity.

use rand::Rng;
use sqlx::{Pool, Sqlite};

use elaudit_common::model::TechnicianIdentity;
use elaudit_common::{Error, Result};

const IDENTITY_KEY: &str = "technician_identity";

/// Key of the persisted snapshot for an audit token
fn audit_key(token: &str) -> String {
    format!("audit_{}", token)
}

/// Load the persisted audit snapshot for `token`, if any
pub async fn load_audit_state(db: &Pool<Sqlite>, token: &str) -> Result<Option<String>> {
    get_entry(db, &audit_key(token)).await
}

/// Store the serialized audit snapshot for `token` (UPSERT)
pub async fn save_audit_state(db: &Pool<Sqlite>, token: &str, json: &str) -> Result<()> {
    set_entry(db, &audit_key(token), json).await
}

/// Get or auto-initialize the device's technician identity
///
/// If no identity is stored yet, generates a `tech_xxxxxxxx` id with a
/// placeholder name and persists it, so the id stays stable across sessions.
pub async fn get_or_init_identity(db: &Pool<Sqlite>) -> Result<TechnicianIdentity> {
    if let Some(raw) = get_entry(db, IDENTITY_KEY).await? {
        match serde_json::from_str::<TechnicianIdentity>(&raw) {
            Ok(identity) => return Ok(identity),
            Err(e) => {
                tracing::warn!("Stored technician identity is malformed, regenerating: {}", e);
            }
        }
    }

    let identity = TechnicianIdentity {
        id: generate_technician_id(),
        name: "Technician".to_string(),
    };
    set_identity(db, &identity).await?;

    tracing::info!(technician_id = %identity.id, "Initialized technician identity");
    Ok(identity)
}

/// Persist a (possibly renamed) technician identity
pub async fn set_identity(db: &Pool<Sqlite>, identity: &TechnicianIdentity) -> Result<()> {
    let json = serde_json::to_string(identity)
        .map_err(|e| Error::Internal(format!("Serialize identity failed: {}", e)))?;
    set_entry(db, IDENTITY_KEY, &json).await
}

fn generate_technician_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..8)
        .map(|_| {
            let n = rng.gen_range(0..36u32);
            std::char::from_digit(n, 36).unwrap_or('0')
        })
        .collect();
    format!("tech_{}", suffix)
}

/// Generic state getter (internal)
async fn get_entry(db: &Pool<Sqlite>, key: &str) -> Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM local_state WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    Ok(row.map(|(value,)| value))
}

/// Generic state setter (internal)
async fn set_entry(db: &Pool<Sqlite>, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO local_state (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value)
    .execute(db)
    .await
    .map_err(Error::Database)?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;

    #[tokio::test]
    async fn test_audit_state_absent() {
        let pool = memory_pool().await;
        let result = load_audit_state(&pool, "no-such-token").await.unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_audit_state_roundtrip_and_upsert() {
        let pool = memory_pool().await;

        save_audit_state(&pool, "tok-1", "{\"v\":1}").await.unwrap();
        save_audit_state(&pool, "tok-1", "{\"v\":2}").await.unwrap();

        let loaded = load_audit_state(&pool, "tok-1").await.unwrap();
        assert_eq!(loaded.as_deref(), Some("{\"v\":2}"));

        // Only one row for the token after the update
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM local_state WHERE key = 'audit_tok-1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_identity_stable_across_calls() {
        let pool = memory_pool().await;

        let first = get_or_init_identity(&pool).await.unwrap();
        assert!(first.id.starts_with("tech_"));
        assert_eq!(first.id.len(), "tech_".len() + 8);

        let second = get_or_init_identity(&pool).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_identity_rename_persists() {
        let pool = memory_pool().await;

        let mut identity = get_or_init_identity(&pool).await.unwrap();
        identity.name = "Ana".to_string();
        set_identity(&pool, &identity).await.unwrap();

        let reloaded = get_or_init_identity(&pool).await.unwrap();
        assert_eq!(reloaded.name, "Ana");
        assert_eq!(reloaded.id, identity.id);
    }

    #[tokio::test]
    async fn test_malformed_identity_regenerated() {
        let pool = memory_pool().await;
        set_entry(&pool, IDENTITY_KEY, "not json").await.unwrap();

        let identity = get_or_init_identity(&pool).await.unwrap();
        assert!(identity.id.starts_with("tech_"));
    }
}
