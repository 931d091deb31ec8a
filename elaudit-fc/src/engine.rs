//! Sync engine
//!
//! The single context object owning the module store, offline queue, Hub
//! client, technician identity and connectivity state. Created once per
//! session (`create`) and torn down explicitly (`teardown`); all periodic
//! work enters through [`SyncEngine::tick`], driven by the scheduler in
//! production and called directly in tests.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use sqlx::SqlitePool;
use tokio::sync::Mutex;

use elaudit_common::api::{
    BulkUpdateRequest, HeartbeatRequest, ModuleUpdateRequest, TechnicianInfo,
};
use elaudit_common::events::{AuditEvent, EventBus};
use elaudit_common::model::{
    AuditSession, ModuleRecord, ModuleStatus, PendingUpdate, TechnicianIdentity,
};
use elaudit_common::{time, Error, Result};

use crate::hub::HubClient;
use crate::presence::PresenceTracker;
use crate::queue::UpdateQueue;
use crate::report;
use crate::resolver::{self, Resolution};
use crate::scheduler::SyncTask;
use crate::store::ModuleStore;

/// Result of a bulk status change
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct BulkOutcome {
    /// Number of module ids in the request
    pub requested: usize,
    /// Ids the Hub updated
    pub updated: u32,
    /// Ids the Hub did not know
    pub not_found: u32,
    /// Records created locally because they were missing from the index
    pub created_locally: u32,
    /// True when the change was queued instead of pushed (offline)
    pub queued: bool,
}

/// Shared state of one audit session on this device
pub struct SyncEngine {
    db: SqlitePool,
    hub: HubClient,
    identity: TechnicianIdentity,
    events: EventBus,
    store: Mutex<ModuleStore>,
    queue: Mutex<UpdateQueue>,
    presence: Mutex<PresenceTracker>,
    online: AtomicBool,
    /// Epoch-ms cursor for incremental pulls
    watermark_ms: AtomicI64,
    heartbeat_failures: AtomicU64,
}

impl SyncEngine {
    /// Create the engine for one audit session
    ///
    /// Restores the persisted local session when one exists for the Hub
    /// client's audit token; otherwise falls back to a full fetch from the
    /// Hub and persists it immediately.
    pub async fn create(
        db: SqlitePool,
        hub: HubClient,
        identity: TechnicianIdentity,
        events: EventBus,
    ) -> Result<Arc<Self>> {
        let token = hub.audit_token().to_string();

        let store = match ModuleStore::restore(&db, &token).await? {
            Some(store) => {
                tracing::info!(
                    audit_token = %token,
                    modules = store.len(),
                    "Restored persisted audit session"
                );
                store
            }
            None => {
                tracing::info!(audit_token = %token, "No usable local session, fetching from Hub");
                let payload = hub.fetch_audit().await?;
                let store = ModuleStore::from_fetch(payload);
                store.persist(&db).await?;
                tracing::info!(modules = store.len(), "Audit fetched and persisted");
                store
            }
        };

        let watermark = store.last_sync_ms();

        Ok(Arc::new(Self {
            db,
            hub,
            identity,
            events,
            store: Mutex::new(store),
            queue: Mutex::new(UpdateQueue::new()),
            presence: Mutex::new(PresenceTracker::new()),
            online: AtomicBool::new(true),
            watermark_ms: AtomicI64::new(watermark),
            heartbeat_failures: AtomicU64::new(0),
        }))
    }

    /// Stop-path persist; the scheduler must already be stopped
    ///
    /// Any poll or push still in flight is abandoned, which is safe because
    /// the store is written out here before the process exits.
    pub async fn teardown(&self) -> Result<()> {
        self.persist().await
    }

    pub fn identity(&self) -> &TechnicianIdentity {
        &self.identity
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn heartbeat_failure_count(&self) -> u64 {
        self.heartbeat_failures.load(Ordering::SeqCst)
    }

    pub async fn audit(&self) -> AuditSession {
        self.store.lock().await.audit().clone()
    }

    pub async fn snapshot(&self) -> Vec<ModuleRecord> {
        self.store.lock().await.snapshot()
    }

    pub async fn queue_len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn technicians(&self) -> Vec<TechnicianInfo> {
        self.presence.lock().await.technicians().to_vec()
    }

    /// Dispatch one named periodic task
    ///
    /// Failures of background work are logged, never propagated: the worst
    /// case is stale or locally-only data, recovered by a later tick.
    pub async fn tick(&self, task: SyncTask) {
        match task {
            SyncTask::Pull => {
                if let Err(e) = self.pull_updates().await {
                    tracing::debug!("Update pull failed: {}", e);
                }
            }
            SyncTask::Heartbeat => self.send_heartbeat().await,
            SyncTask::Presence => self.refresh_presence().await,
            SyncTask::Persist => {
                if let Err(e) = self.persist().await {
                    tracing::warn!("Periodic persist failed: {}", e);
                }
            }
        }
    }

    /// Apply a local status change and deliver it
    ///
    /// The store is mutated and persisted first in all cases. Delivery then
    /// depends on the connectivity signal: online pushes immediately and
    /// surfaces any failure to the caller; offline enqueues for later replay.
    /// A push failing while the engine believes it is online is a genuine
    /// error, not a reason to queue.
    pub async fn set_module_status(
        &self,
        module_id: &str,
        status: ModuleStatus,
        comment: Option<String>,
    ) -> Result<ModuleRecord> {
        let record = {
            let mut store = self.store.lock().await;
            let record = store
                .apply_local(module_id, status, comment.clone(), &self.identity.id)
                .ok_or_else(|| Error::NotFound(format!("Unknown module: {}", module_id)))?;
            store.persist(&self.db).await?;
            record
        };

        self.events.emit(AuditEvent::ModuleUpdated {
            module_id: record.id.clone(),
            status,
            technician_id: self.identity.id.clone(),
            timestamp: record.last_modified_at,
        });

        if self.is_online() {
            let request = ModuleUpdateRequest {
                status,
                comment,
                technician_id: self.identity.id.clone(),
            };
            self.hub.push_update(module_id, &request).await?;
        } else {
            let mut queue = self.queue.lock().await;
            queue.enqueue(PendingUpdate {
                module_id: record.id.clone(),
                status,
                comment: record.comment.clone(),
                technician_id: self.identity.id.clone(),
                enqueued_at: time::now(),
            });
        }

        Ok(record)
    }

    /// Apply one status to several modules at once
    ///
    /// Online, the Hub call reports partial success (`updated`/`not_found`)
    /// and the whole batch is applied locally regardless; ids missing from
    /// the local index are created so the `not_found` portion is not lost.
    /// Offline, the batch is applied locally and queued per module.
    pub async fn bulk_update(
        &self,
        module_ids: &[String],
        status: ModuleStatus,
        comment: Option<String>,
    ) -> Result<BulkOutcome> {
        if module_ids.is_empty() {
            return Err(Error::InvalidInput("No modules selected".to_string()));
        }

        let online = self.is_online();
        let (updated, not_found) = if online {
            let request = BulkUpdateRequest {
                modules: module_ids.to_vec(),
                status,
                comment: comment.clone(),
                technician_id: self.identity.id.clone(),
            };
            let response = self.hub.push_bulk(&request).await?;
            (response.updated, response.not_found)
        } else {
            (0, 0)
        };

        let mut created_locally = 0u32;
        {
            let mut store = self.store.lock().await;
            for module_id in module_ids {
                if store
                    .apply_local(module_id, status, comment.clone(), &self.identity.id)
                    .is_none()
                {
                    // Not in the local index either: create it with the
                    // requested status, placement unknown
                    store.set(ModuleRecord {
                        id: module_id.clone(),
                        status,
                        comment: comment.clone(),
                        string_number: None,
                        position_in_string: None,
                        last_modified_by: Some(self.identity.id.clone()),
                        last_modified_at: time::now(),
                    });
                    created_locally += 1;
                }
            }
            store.persist(&self.db).await?;
        }

        for module_id in module_ids {
            self.events.emit(AuditEvent::ModuleUpdated {
                module_id: module_id.clone(),
                status,
                technician_id: self.identity.id.clone(),
                timestamp: time::now(),
            });
        }

        if !online {
            let mut queue = self.queue.lock().await;
            for module_id in module_ids {
                queue.enqueue(PendingUpdate {
                    module_id: module_id.clone(),
                    status,
                    comment: comment.clone(),
                    technician_id: self.identity.id.clone(),
                    enqueued_at: time::now(),
                });
            }
        }

        Ok(BulkOutcome {
            requested: module_ids.len(),
            updated,
            not_found,
            created_locally,
            queued: !online,
        })
    }

    /// Pull remote changes since the watermark and merge them
    ///
    /// Returns how many updates were applied over local state. The watermark
    /// advances to the newest `updated_at` seen, so a skewed local clock
    /// cannot skip remote updates; an empty response leaves it unchanged.
    pub async fn pull_updates(&self) -> Result<usize> {
        if !self.is_online() {
            return Ok(0);
        }

        let watermark = self.watermark_ms.load(Ordering::SeqCst);
        let updates = self.hub.pull_since(watermark).await?;
        if updates.is_empty() {
            return Ok(0);
        }

        let mut applied = 0;
        let mut max_seen_ms = watermark;
        {
            let mut store = self.store.lock().await;
            for update in updates {
                let update_ms = time::to_epoch_ms(update.updated_at);
                if update_ms > max_seen_ms {
                    max_seen_ms = update_ms;
                }
                if resolver::apply_remote(&mut store, update, &self.identity.id, &self.events)
                    == Resolution::Applied
                {
                    applied += 1;
                }
            }
            store.mark_synced();
            store.persist(&self.db).await?;
        }
        self.watermark_ms.store(max_seen_ms, Ordering::SeqCst);

        Ok(applied)
    }

    /// Send a liveness beacon
    ///
    /// Failures are never surfaced to the user; they are logged, counted and
    /// emitted as events so they stay observable.
    pub async fn send_heartbeat(&self) {
        if !self.is_online() {
            return;
        }

        let request = HeartbeatRequest {
            technician_id: self.identity.id.clone(),
            technician_name: self.identity.name.clone(),
        };
        match self.hub.heartbeat(&request).await {
            Ok(()) => {
                self.heartbeat_failures.store(0, Ordering::SeqCst);
            }
            Err(e) => {
                let failures = self.heartbeat_failures.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::warn!(consecutive_failures = failures, "Heartbeat failed: {}", e);
                self.events.emit(AuditEvent::HeartbeatFailed {
                    consecutive_failures: failures,
                    timestamp: time::now(),
                });
            }
        }
    }

    /// Refresh the active-technician list; stale data is kept on failure
    pub async fn refresh_presence(&self) {
        if !self.is_online() {
            return;
        }

        let mut presence = self.presence.lock().await;
        if presence.refresh(&self.hub).await {
            let technicians = presence.technicians().to_vec();
            drop(presence);
            self.events.emit(AuditEvent::TechniciansChanged {
                technicians,
                timestamp: time::now(),
            });
        }
    }

    /// Write the durable snapshot
    pub async fn persist(&self) -> Result<()> {
        self.store.lock().await.persist(&self.db).await
    }

    /// Flip the connectivity signal
    ///
    /// The engine trusts this signal (the runtime's online/offline report)
    /// rather than inferring connectivity from request failures. Going
    /// online triggers a queue replay.
    pub async fn set_online(&self, online: bool) {
        let was_online = self.online.swap(online, Ordering::SeqCst);
        if was_online == online {
            return;
        }

        tracing::info!(online, "Connectivity changed");
        self.events.emit(AuditEvent::ConnectivityChanged {
            online,
            timestamp: time::now(),
        });

        if online {
            if let Err(e) = self.drain_queue().await {
                tracing::warn!("Queue replay after reconnect failed: {}", e);
            }
        }
    }

    /// Replay the offline queue in order, stopping at the first failure
    pub async fn drain_queue(&self) -> Result<usize> {
        let mut queue = self.queue.lock().await;
        if queue.is_empty() {
            return Ok(0);
        }

        let hub = &self.hub;
        let sent = queue
            .drain_all(|update| {
                let request = ModuleUpdateRequest {
                    status: update.status,
                    comment: update.comment.clone(),
                    technician_id: update.technician_id.clone(),
                };
                async move {
                    hub.push_update(&update.module_id, &request)
                        .await
                        .map_err(elaudit_common::Error::from)
                }
            })
            .await;
        let remaining = queue.len();
        drop(queue);

        tracing::info!(sent, remaining, "Offline queue replayed");
        self.events.emit(AuditEvent::QueueDrained {
            sent,
            remaining,
            timestamp: time::now(),
        });

        Ok(sent)
    }

    /// Push the audit summary to the Hub project registry
    pub async fn push_project_summary(&self) -> Result<()> {
        let summary = {
            let store = self.store.lock().await;
            report::project_summary(
                store.audit(),
                &store.snapshot(),
                vec![self.identity.name.clone()],
            )
        };
        self.hub.push_summary(&summary).await?;
        Ok(())
    }
}
