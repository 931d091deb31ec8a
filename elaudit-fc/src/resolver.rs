//! Conflict resolution for incoming remote updates
//!
//! Last-writer-wins keyed on update timestamps: a remote update is applied
//! iff its `updated_at` is at or after the local record's `last_modified_at`.
//! The strict-greater local case is discarded deliberately, so a stale poll
//! response in flight cannot visibly revert a technician's just-made edit.
//!
//! Timestamps are client-supplied wall clocks, so the rule is vulnerable to
//! clock skew across devices; a server-assigned sequence number would be a
//! safer ordering key but would change observable behavior.

use elaudit_common::api::RemoteUpdate;
use elaudit_common::events::{AuditEvent, EventBus};

use crate::store::ModuleStore;

/// Outcome of merging one remote update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Remote state overwrote local state
    Applied,
    /// Local record is newer; the remote update was dropped
    DiscardedStale,
    /// No local record with that id exists
    UnknownModule,
}

/// Merge one remote update into the store
///
/// On apply, overwrites status, comment and last-modified fields. When the
/// update originated from another technician an event is emitted so the UI
/// can name who changed what.
///
/// Updates within one poll batch are merged in response order, so for
/// duplicate ids the last entry in the batch wins (the Hub returns updates
/// in chronological order).
pub fn apply_remote(
    store: &mut ModuleStore,
    update: RemoteUpdate,
    local_technician_id: &str,
    events: &EventBus,
) -> Resolution {
    let local = match store.get(&update.module_id) {
        Some(record) => record,
        None => {
            tracing::debug!(module_id = %update.module_id, "Remote update for unknown module");
            return Resolution::UnknownModule;
        }
    };

    if local.last_modified_at > update.updated_at {
        tracing::debug!(
            module_id = %update.module_id,
            local_at = %local.last_modified_at,
            remote_at = %update.updated_at,
            "Discarded stale remote update"
        );
        return Resolution::DiscardedStale;
    }

    let mut record = local.clone();
    record.status = update.status;
    record.comment = update.comment.clone();
    record.last_modified_by = Some(update.technician_id.clone());
    record.last_modified_at = update.updated_at;
    store.set(record);

    if update.technician_id != local_technician_id {
        events.emit(AuditEvent::RemoteModuleUpdated {
            module_id: update.module_id,
            status: update.status,
            technician_id: update.technician_id,
            technician_name: update.technician_name,
            timestamp: update.updated_at,
        });
    }

    Resolution::Applied
}
