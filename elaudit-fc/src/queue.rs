//! Update Queue
//!
//! Ordered buffer of module-status changes accumulated while the Hub is
//! unreachable. No deduplication: several updates to the same module may
//! coexist, and replaying them in enqueue order makes the last one win on
//! both sides.

use std::collections::VecDeque;
use std::future::Future;

use elaudit_common::model::PendingUpdate;
use elaudit_common::Result;

/// FIFO buffer of undelivered module updates
#[derive(Debug, Default)]
pub struct UpdateQueue {
    items: VecDeque<PendingUpdate>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self { items: VecDeque::new() }
    }

    /// Append an update; intentionally no dedup (replay order resolves it)
    pub fn enqueue(&mut self, update: PendingUpdate) {
        tracing::debug!(
            module_id = %update.module_id,
            queued = self.items.len() + 1,
            "Queued offline update"
        );
        self.items.push_back(update);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Replay queued updates in FIFO order through `send`
    ///
    /// Stops at the first failed send; the failed item and everything behind
    /// it stay queued for a later attempt, preserving order. An item that was
    /// accepted by the server but failed on the response path gets sent twice
    /// on the next drain, which is harmless: a later status always overwrites.
    ///
    /// Returns the number of updates successfully sent.
    pub async fn drain_all<F, Fut>(&mut self, mut send: F) -> usize
    where
        F: FnMut(PendingUpdate) -> Fut,
        Fut: Future<Output = Result<()>>,
    {
        let mut sent = 0;
        while let Some(update) = self.items.pop_front() {
            match send(update.clone()).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!(
                        module_id = %update.module_id,
                        remaining = self.items.len() + 1,
                        "Queue replay interrupted: {}",
                        e
                    );
                    self.items.push_front(update);
                    break;
                }
            }
        }
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elaudit_common::model::ModuleStatus;
    use elaudit_common::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pending(module_id: &str, status: ModuleStatus) -> PendingUpdate {
        PendingUpdate {
            module_id: module_id.to_string(),
            status,
            comment: None,
            technician_id: "tech_t".to_string(),
            enqueued_at: elaudit_common::time::now(),
        }
    }

    #[tokio::test]
    async fn test_drain_sends_in_fifo_order() {
        let mut queue = UpdateQueue::new();
        queue.enqueue(pending("M001", ModuleStatus::Ok));
        queue.enqueue(pending("M002", ModuleStatus::Dead));
        queue.enqueue(pending("M001", ModuleStatus::Microcracks));

        let sent_ids = std::sync::Mutex::new(Vec::new());
        let sent = queue
            .drain_all(|u| {
                sent_ids.lock().unwrap().push((u.module_id.clone(), u.status));
                async { Ok(()) }
            })
            .await;

        assert_eq!(sent, 3);
        assert!(queue.is_empty());

        let sent_ids = sent_ids.into_inner().unwrap();
        assert_eq!(sent_ids[0], ("M001".to_string(), ModuleStatus::Ok));
        assert_eq!(sent_ids[2], ("M001".to_string(), ModuleStatus::Microcracks));
    }

    #[tokio::test]
    async fn test_drain_stops_on_first_failure_keeping_failed_item() {
        let mut queue = UpdateQueue::new();
        queue.enqueue(pending("M001", ModuleStatus::Ok));
        queue.enqueue(pending("M002", ModuleStatus::Dead));
        queue.enqueue(pending("M003", ModuleStatus::Ok));

        let calls = AtomicUsize::new(0);
        let sent = queue
            .drain_all(|_u| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 1 {
                        Err(Error::Network("connection reset".to_string()))
                    } else {
                        Ok(())
                    }
                }
            })
            .await;

        // First item delivered, second failed and stays at the head
        assert_eq!(sent, 1);
        assert_eq!(queue.len(), 2);

        let replay = std::sync::Mutex::new(Vec::new());
        let sent = queue
            .drain_all(|u| {
                replay.lock().unwrap().push(u.module_id.clone());
                async { Ok(()) }
            })
            .await;

        assert_eq!(sent, 2);
        assert_eq!(*replay.lock().unwrap(), vec!["M002", "M003"]);
    }

    #[tokio::test]
    async fn test_drain_empty_queue() {
        let mut queue = UpdateQueue::new();
        let sent = queue.drain_all(|_u| async { Ok(()) }).await;
        assert_eq!(sent, 0);
    }
}
